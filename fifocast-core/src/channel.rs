//! Live-edge broadcast channel.
//!
//! A single-slot, sequence-numbered broadcast primitive: one producer
//! overwrites the "latest chunk" slot, any number of consumers observe
//! sequence advances. Consumers that fall behind skip straight to the
//! newest value instead of queueing history, so a slow or stalled client
//! can never hold back the producer or grow memory.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;

/// The shared slot: the payload of the most recent publish and its
/// sequence number. Sequence 0 means "nothing published yet".
#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    chunk: Bytes,
}

/// Broadcast handle shared by the producer and the HTTP state.
///
/// Cloning is cheap; all clones publish into the same slot. Subscribers
/// created from any clone observe the same sequence.
#[derive(Debug, Clone)]
pub struct LiveChannel {
    tx: Arc<watch::Sender<Slot>>,
}

impl LiveChannel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(Slot {
                seq: 0,
                chunk: Bytes::new(),
            })),
        }
    }

    /// Store `chunk` as the current value and advance the sequence by one,
    /// waking every waiting subscriber.
    ///
    /// Never blocks and never fails, regardless of how many subscribers
    /// exist or how slowly they consume.
    pub fn publish(&self, chunk: Bytes) {
        self.tx.send_modify(|slot| {
            slot.seq += 1;
            slot.chunk = chunk;
        });
    }

    /// The sequence number of the most recent publish, without blocking.
    #[must_use]
    pub fn current_seq(&self) -> u64 {
        self.tx.borrow().seq
    }

    /// Create a subscriber joined at the current sequence.
    ///
    /// The receiver only ever yields chunks published after this call;
    /// there is no replay of history.
    #[must_use]
    pub fn subscribe(&self) -> LiveReceiver {
        let rx = self.tx.subscribe();
        let last_seq = rx.borrow().seq;
        LiveReceiver { rx, last_seq }
    }

    /// Number of live subscribers (for logging).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-consumer cursor over the live edge.
#[derive(Debug)]
pub struct LiveReceiver {
    rx: watch::Receiver<Slot>,
    last_seq: u64,
}

impl LiveReceiver {
    /// Wait until the sequence advances past the last value this receiver
    /// observed, then yield the then-current `(chunk, sequence)`.
    ///
    /// Publishes that happen while the receiver is suspended are not
    /// queued; only the newest one is visible on wakeup. Sequences yielded
    /// by successive calls are strictly increasing. Returns `None` once
    /// the channel has been dropped.
    pub async fn next(&mut self) -> Option<(Bytes, u64)> {
        let last = self.last_seq;
        // wait_for evaluates the predicate against the same versioned slot
        // the waiter parks on, so an advance between check and park cannot
        // be missed.
        let slot = self.rx.wait_for(|slot| slot.seq != last).await.ok()?;
        let (chunk, seq) = (slot.chunk.clone(), slot.seq);
        drop(slot);
        self.last_seq = seq;
        Some((chunk, seq))
    }

    /// The sequence this receiver joined at or last observed.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn sequences_are_strictly_increasing() {
        let channel = LiveChannel::new();
        let mut rx = channel.subscribe();

        let mut last = rx.last_seq();
        for i in 0..5u8 {
            channel.publish(Bytes::from(vec![i]));
            let (_, seq) = rx.next().await.expect("channel open");
            assert!(seq > last, "sequence went backwards: {seq} <= {last}");
            last = seq;
        }
    }

    #[tokio::test]
    async fn join_point_prevents_replay() {
        let channel = LiveChannel::new();

        channel.publish(Bytes::from_static(b"before"));
        channel.publish(Bytes::from_static(b"also before"));
        let join_seq = channel.current_seq();

        let mut rx = channel.subscribe();
        channel.publish(Bytes::from_static(b"after"));

        let (chunk, seq) = rx.next().await.expect("channel open");
        assert!(seq > join_seq);
        assert_eq!(chunk, Bytes::from_static(b"after"));
    }

    #[tokio::test]
    async fn burst_is_skipped_to_live_edge() {
        let channel = LiveChannel::new();
        let mut rx = channel.subscribe();

        channel.publish(Bytes::from_static(b"n1"));
        channel.publish(Bytes::from_static(b"n2"));
        channel.publish(Bytes::from_static(b"n3"));

        let (chunk, seq) = rx.next().await.expect("channel open");
        assert_eq!(seq, 3);
        assert_eq!(chunk, Bytes::from_static(b"n3"));

        // Nothing else is queued behind the live edge.
        let pending = timeout(Duration::from_millis(50), rx.next()).await;
        assert!(pending.is_err(), "receiver observed a stale chunk");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_block() {
        let channel = LiveChannel::new();
        for i in 0..1000u32 {
            channel.publish(Bytes::from(i.to_le_bytes().to_vec()));
        }
        assert_eq!(channel.current_seq(), 1000);
    }

    #[tokio::test]
    async fn dropped_subscriber_does_not_disturb_others() {
        let channel = LiveChannel::new();
        let mut alive = channel.subscribe();
        let dropped = channel.subscribe();
        drop(dropped);

        channel.publish(Bytes::from_static(b"still flowing"));
        let (chunk, seq) = alive.next().await.expect("channel open");
        assert_eq!(seq, 1);
        assert_eq!(chunk, Bytes::from_static(b"still flowing"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn two_waiters_both_observe_then_latest_only() {
        let channel = LiveChannel::new();
        let mut rx1 = channel.subscribe();
        let mut rx2 = channel.subscribe();

        let waiter1 = tokio::spawn(async move {
            let got = rx1.next().await;
            (rx1, got)
        });
        let waiter2 = tokio::spawn(async move {
            let got = rx2.next().await;
            (rx2, got)
        });

        // Give both waiters time to park before the publish.
        tokio::time::sleep(Duration::from_millis(50)).await;
        channel.publish(Bytes::from_static(b"A"));

        let (mut rx1, got1) = waiter1.await.expect("waiter1 panicked");
        let (mut rx2, got2) = waiter2.await.expect("waiter2 panicked");
        assert_eq!(got1, Some((Bytes::from_static(b"A"), 1)));
        assert_eq!(got2, Some((Bytes::from_static(b"A"), 1)));

        // Publish with nobody waiting; each receiver sees it exactly once.
        channel.publish(Bytes::from_static(b"B"));
        assert_eq!(rx1.next().await, Some((Bytes::from_static(b"B"), 2)));
        assert_eq!(rx2.next().await, Some((Bytes::from_static(b"B"), 2)));
    }

    #[tokio::test]
    async fn closed_channel_ends_receiver() {
        let channel = LiveChannel::new();
        let mut rx = channel.subscribe();
        drop(channel);
        assert_eq!(rx.next().await, None);
    }
}
