pub mod server;
pub mod stream;
