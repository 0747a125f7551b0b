//! Named-pipe reader.
//!
//! Owns the upstream FIFO and is the sole producer into the
//! [`LiveChannel`]. Runs a reopen loop forever: the upstream writer may
//! disconnect and reconnect at any time, and neither case is fatal.
//!
//! Opening a FIFO read end blocks until a writer connects, so the open
//! runs on the blocking thread pool. Once open, the handle is switched to
//! non-blocking and driven by readiness notifications; a readiness signal
//! without data (`WouldBlock`) is a benign race, not an error.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::unix::pipe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::channel::LiveChannel;
use crate::config::PipeConfig;

/// Why the read loop gave the pipe handle back.
enum ReadOutcome {
    /// EOF or read error: every writer closed its end. Reopen.
    WriterClosed,
    /// Shutdown requested. Stop the reader for good.
    Cancelled,
}

/// Continuously opens, reads and republishes the upstream byte stream.
pub struct PipeSource {
    path: PathBuf,
    chunk_size: usize,
    open_retry: Duration,
    reopen_backoff: Duration,
    channel: LiveChannel,
    shutdown: CancellationToken,
}

impl PipeSource {
    #[must_use]
    pub fn new(config: &PipeConfig, channel: LiveChannel, shutdown: CancellationToken) -> Self {
        Self {
            path: config.path.clone(),
            chunk_size: config.chunk_size,
            open_retry: Duration::from_millis(config.open_retry_ms),
            reopen_backoff: Duration::from_millis(config.reopen_backoff_ms),
            channel,
            shutdown,
        }
    }

    /// Spawn the reader onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the shutdown token fires.
    pub async fn run(self) {
        info!(path = %self.path.display(), "pipe reader started");

        loop {
            let receiver = tokio::select! {
                () = self.shutdown.cancelled() => break,
                opened = self.open() => match opened {
                    Ok(receiver) => receiver,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        // Transient: the path may reappear (e.g. the writer
                        // recreates it). Distinct from the startup check.
                        debug!(path = %self.path.display(), "pipe missing, retrying");
                        if self.pause(self.open_retry).await { continue } else { break }
                    }
                    Err(e) => {
                        warn!(path = %self.path.display(), error = %e, "failed to open pipe");
                        if self.pause(self.open_retry).await { continue } else { break }
                    }
                },
            };

            info!(path = %self.path.display(), "writer connected");

            match self.read_loop(&receiver).await {
                ReadOutcome::Cancelled => break,
                ReadOutcome::WriterClosed => {
                    debug!(path = %self.path.display(), "writer closed, reopening");
                    drop(receiver);
                    if !self.pause(self.reopen_backoff).await {
                        break;
                    }
                }
            }
        }

        info!(path = %self.path.display(), "pipe reader stopped");
    }

    /// Open the FIFO read end, waiting for a writer to connect.
    async fn open(&self) -> io::Result<pipe::Receiver> {
        let path = self.path.clone();
        // File::open on a FIFO parks the thread until a writer shows up.
        let file = tokio::task::spawn_blocking(move || std::fs::File::open(path))
            .await
            .map_err(io::Error::other)??;
        pipe::Receiver::from_file(file)
    }

    /// Readiness-driven read loop. One successful read becomes exactly one
    /// published chunk; there is no queue between the pipe and the channel.
    async fn read_loop(&self, receiver: &pipe::Receiver) -> ReadOutcome {
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => return ReadOutcome::Cancelled,
                ready = receiver.readable() => {
                    if let Err(e) = ready {
                        warn!(error = %e, "pipe readiness wait failed");
                        return ReadOutcome::WriterClosed;
                    }
                }
            }

            match receiver.try_read(&mut buf) {
                // Zero-length read: every writer closed its end.
                Ok(0) => return ReadOutcome::WriterClosed,
                Ok(n) => {
                    trace!(bytes = n, "chunk read");
                    self.channel.publish(Bytes::copy_from_slice(&buf[..n]));
                }
                // Readiness was stale; wait for the next notification.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!(error = %e, "pipe read failed");
                    return ReadOutcome::WriterClosed;
                }
            }
        }
    }

    /// Sleep unless shutdown fires first. Returns false on shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
