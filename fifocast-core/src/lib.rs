pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod source;
pub mod wav;

pub use channel::{LiveChannel, LiveReceiver};
pub use config::Config;
pub use error::{Error, Result};
pub use source::PipeSource;
