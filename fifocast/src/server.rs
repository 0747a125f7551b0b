//! Server lifecycle management.
//!
//! Wires the pipe reader to the HTTP surface and owns process lifetime:
//! one long-lived reader task, one axum server, and a cancellation token
//! that stops both on SIGTERM/Ctrl+C.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{error, info};

use fifocast_core::{wav, Config, LiveChannel, PipeSource};

use crate::stream;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live-edge broadcast of the newest PCM chunk.
    pub channel: LiveChannel,
    /// Pre-encoded WAV header, sent once per connection.
    pub wav_header: Bytes,
    /// Fires on shutdown; ends every streaming session promptly.
    pub shutdown: CancellationToken,
}

/// Build the application router.
///
/// Everything outside the stream endpoint falls back to static files
/// (the player page lives there).
pub fn router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/stream.wav", get(stream::handle_stream))
        .route("/healthz", get(healthz))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// fifocast server - owns the reader task and the HTTP listener
pub struct FifocastServer {
    config: Config,
}

impl FifocastServer {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start the reader and the HTTP server, then wait for shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let channel = LiveChannel::new();
        let shutdown = CancellationToken::new();

        let reader = PipeSource::new(
            &self.config.pipe,
            channel.clone(),
            shutdown.child_token(),
        )
        .spawn();

        let state = AppState {
            channel,
            wav_header: wav::header(&self.config.audio, wav::UNBOUNDED_DATA_LEN),
            shutdown: shutdown.child_token(),
        };
        let app = router(state, &self.config.server.static_dir);

        let addr: SocketAddr = self.config.http_address().parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on {}", addr);

        // Streaming connections never end on their own; cancelling the
        // token here is what lets the graceful drain below finish.
        let graceful = {
            let shutdown = shutdown.clone();
            async move {
                shutdown_signal().await;
                info!("Shutdown signal received, stopping sessions and reader...");
                shutdown.cancel();
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .await?;

        if let Err(e) = reader.await {
            error!("pipe reader task failed: {}", e);
        }
        info!("fifocast shut down complete");

        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
