//! Process-wide broadcast channel shared by all simulated contexts.
//!
//! Stands in for the browser's same-origin `BroadcastChannel`: `post` is
//! fire-and-forget, delivery is asynchronous, and a context never observes
//! its own frames. FIFO order per sender is inherited from the underlying
//! tokio broadcast channel; no ordering is guaranteed between senders.
//!
//! Each simulated tab/context holds one [`ChannelHandle`] minted from the
//! shared [`LocalChannel`]. A handle can post envelopes and open any number
//! of [`Subscription`]s — the bus keeps one long-lived subscription for its
//! inbound pump, and the discovery handshake opens a short-lived one.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::protocol::Envelope;

/// Default frames buffered per subscription before lag drops kick in.
const DEFAULT_CAPACITY: usize = 256;

/// Wire frame: the posting context's id plus the envelope, flattened into
/// one JSON object. The sender id is transport-internal and stripped
/// before envelopes reach the bus.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    sender: Uuid,
    #[serde(flatten)]
    envelope: Envelope,
}

/// The shared broadcast medium for one "origin".
///
/// Cheap to share: mint one handle per context via [`LocalChannel::handle`].
pub struct LocalChannel {
    tx: broadcast::Sender<Arc<Vec<u8>>>,
    capacity: usize,
}

impl LocalChannel {
    /// Create a channel buffering up to `capacity` frames per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Mint a handle with a fresh context identity.
    pub fn handle(&self) -> ChannelHandle {
        ChannelHandle {
            id: Uuid::new_v4(),
            tx: self.tx.clone(),
        }
    }

    /// Buffer capacity per subscription.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live subscriptions across all handles.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One context's endpoint on the shared channel.
///
/// Clones share the same context identity; they represent the same tab.
#[derive(Clone)]
pub struct ChannelHandle {
    id: Uuid,
    tx: broadcast::Sender<Arc<Vec<u8>>>,
}

impl ChannelHandle {
    /// This context's identity on the channel.
    pub fn context_id(&self) -> Uuid {
        self.id
    }

    /// Broadcast an envelope to every other subscribed context.
    ///
    /// Fire-and-forget: posting with no subscribers is not an error, and
    /// an unencodable envelope is logged and dropped rather than surfaced
    /// (the bus API is never-throwing).
    pub fn post(&self, envelope: &Envelope) {
        let frame = Frame {
            sender: self.id,
            envelope: envelope.clone(),
        };
        match serde_json::to_vec(&frame) {
            Ok(bytes) => {
                let _ = self.tx.send(Arc::new(bytes));
            }
            Err(e) => {
                log::warn!("dropping unencodable frame for event {}: {e}", envelope.event);
            }
        }
    }

    /// Open a subscription yielding envelopes posted by *other* contexts.
    ///
    /// Only frames posted after this call are observed.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            own: self.id,
            rx: self.tx.subscribe(),
        }
    }
}

/// A stream of inbound envelopes for one context.
///
/// Dropping the subscription deregisters it — the RAII equivalent of
/// `removeEventListener`, and the reason the discovery handshake cannot
/// leak its temporary handler on either outcome.
pub struct Subscription {
    own: Uuid,
    rx: broadcast::Receiver<Arc<Vec<u8>>>,
}

impl Subscription {
    /// Receive the next envelope from another context.
    ///
    /// Skips this context's own frames (no local echo), undecodable
    /// frames, and lag gaps. Returns `None` once every handle on the
    /// channel has been dropped.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.rx.recv().await {
                Ok(bytes) => match serde_json::from_slice::<Frame>(&bytes) {
                    Ok(frame) if frame.sender == self.own => continue,
                    Ok(frame) => return Some(frame.envelope),
                    Err(e) => {
                        log::warn!("dropping undecodable frame: {e}");
                        continue;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    log::warn!("subscription lagged, {n} frames dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_delivery_to_other_context() {
        let channel = LocalChannel::default();
        let a = channel.handle();
        let b = channel.handle();

        let mut sub_b = b.subscribe();
        a.post(&Envelope::new("r1", "hello", json!(1)));

        let env = timeout(Duration::from_millis(200), sub_b.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.event, "hello");
        assert_eq!(env.room_id, "r1");
    }

    #[tokio::test]
    async fn test_no_local_echo() {
        let channel = LocalChannel::default();
        let a = channel.handle();

        let mut sub_a = a.subscribe();
        a.post(&Envelope::new("r1", "hello", json!(null)));

        // The poster's own subscription never sees the frame.
        let result = timeout(Duration::from_millis(100), sub_a.recv()).await;
        assert!(result.is_err(), "sender must not receive its own frame");
    }

    #[tokio::test]
    async fn test_fifo_per_sender() {
        let channel = LocalChannel::default();
        let a = channel.handle();
        let b = channel.handle();

        let mut sub_b = b.subscribe();
        for i in 0..10 {
            a.post(&Envelope::new("r1", format!("e{i}"), json!(i)));
        }

        for i in 0..10 {
            let env = timeout(Duration::from_millis(200), sub_b.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(env.event, format!("e{i}"));
        }
    }

    #[tokio::test]
    async fn test_post_without_subscribers() {
        let channel = LocalChannel::default();
        let a = channel.handle();
        // No subscriptions open — must not panic or error.
        a.post(&Envelope::new("r1", "void", json!(null)));
    }

    #[tokio::test]
    async fn test_subscription_misses_earlier_frames() {
        let channel = LocalChannel::default();
        let a = channel.handle();
        let b = channel.handle();

        a.post(&Envelope::new("r1", "early", json!(null)));
        let mut sub_b = b.subscribe();
        a.post(&Envelope::new("r1", "late", json!(null)));

        let env = timeout(Duration::from_millis(200), sub_b.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.event, "late");
    }

    #[test]
    fn test_handle_identities() {
        let channel = LocalChannel::default();
        let a = channel.handle();
        let b = channel.handle();
        assert_ne!(a.context_id(), b.context_id());

        // A clone is the same context.
        assert_eq!(a.context_id(), a.clone().context_id());
    }

    #[test]
    fn test_capacity() {
        let channel = LocalChannel::new(64);
        assert_eq!(channel.capacity(), 64);
    }
}
