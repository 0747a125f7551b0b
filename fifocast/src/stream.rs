//! Per-client WAV streaming session.
//!
//! Each `GET /stream.wav` spawns one [`StreamSession`] that joins the
//! live channel at the current sequence and forwards every advance to the
//! client's body channel. A failure on one client's connection ends that
//! session only; the channel, the pipe reader and every other session
//! keep going.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fifocast_core::LiveReceiver;

use crate::server::AppState;

/// Handle `GET /stream.wav`.
///
/// Responds 200 with a chunked body of unknown length: the 44-byte WAV
/// header once, then raw PCM chunks as they are produced, forever. The
/// server never closes the connection on its own.
pub async fn handle_stream(State(state): State<AppState>) -> Response {
    info!(
        subscribers = state.channel.subscriber_count(),
        "stream client connected"
    );

    // Capacity 1: a stalled client fills the body channel and parks the
    // session in send, so nothing is queued behind it. When the client
    // drains again the next wait lands on the newest chunk.
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(1);
    let session = StreamSession::new(
        state.channel.subscribe(),
        state.wav_header.clone(),
        tx,
        state.shutdown.clone(),
    );
    tokio::spawn(session.run());

    let body = Body::from_stream(ReceiverStream::new(rx));

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
    {
        Ok(response) => response.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Drives one client connection from the live channel.
///
/// The outgoing channel is bounded, so a client that stops reading
/// backpressures the session rather than growing a queue of stale
/// audio. The chunks published while the session is parked are simply
/// never observed; on resume [`LiveReceiver::next`] returns the latest.
pub struct StreamSession {
    receiver: LiveReceiver,
    wav_header: Bytes,
    out: mpsc::Sender<Result<Bytes, std::io::Error>>,
    shutdown: CancellationToken,
}

impl StreamSession {
    #[must_use]
    pub fn new(
        receiver: LiveReceiver,
        wav_header: Bytes,
        out: mpsc::Sender<Result<Bytes, std::io::Error>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            wav_header,
            out,
            shutdown,
        }
    }

    /// Forward the header and then every sequence advance until the client
    /// disconnects, the channel closes, or shutdown fires.
    pub async fn run(mut self) {
        let join_seq = self.receiver.last_seq();
        debug!(join_seq, "stream session started");

        if self.out.send(Ok(self.wav_header.clone())).await.is_err() {
            debug!("client went away before the header was sent");
            return;
        }

        loop {
            let advance = tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("stream session cancelled by shutdown");
                    break;
                }
                advance = self.receiver.next() => advance,
            };

            let Some((chunk, seq)) = advance else {
                // Channel dropped; orderly end of body.
                debug!("live channel closed, ending session");
                break;
            };

            // May park here while the client is stalled; shutdown still
            // has to get through.
            let sent = tokio::select! {
                () = self.shutdown.cancelled() => {
                    debug!("stream session cancelled by shutdown");
                    break;
                }
                sent = self.out.send(Ok(chunk)) => sent,
            };
            if sent.is_err() {
                debug!(last_seq = seq, "client disconnected");
                break;
            }
        }
    }
}
