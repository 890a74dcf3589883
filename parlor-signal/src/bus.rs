//! Room-scoped signaling bus for one simulated context.
//!
//! One [`SignalBus`] per context (tab). The bus owns a session
//! (`user_id` + current room), a listener registry, and an inbound pump
//! task that filters the shared channel down to the session's room:
//!
//! ```text
//! other contexts ──► LocalChannel ──► pump ──┬── system:ping → reply pong
//!                                            └── room match  → listeners
//! SignalBus::emit ──► LocalChannel  (no local echo)
//! ```
//!
//! There are no recoverable errors here: the broadcast medium is always
//! available in-process, and the only negative outcome — a discovery
//! timeout — is an ordinary `false`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use uuid::Uuid;

use crate::channel::{ChannelHandle, LocalChannel, Subscription};
use crate::protocol::{Envelope, SYSTEM_PING, SYSTEM_PONG};

/// Delay between `connect` and the `user:joined` broadcast. Gives the
/// other contexts time to mount their listeners, approximating real
/// connection latency.
pub const JOIN_DELAY: Duration = Duration::from_millis(300);

/// Bounded wait for a discovery pong before `check_room` resolves `false`.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Handle returned by [`SignalBus::on`], used to deregister the listener.
///
/// Stands in for JS removal-by-function-reference: every registration gets
/// a distinct id, so registering the same closure twice yields two
/// independently removable listeners.
pub type ListenerId = u64;

type Listener = Arc<dyn Fn(Value) + Send + Sync>;
type Registry = HashMap<String, Vec<(ListenerId, Listener)>>;

/// The bus's own connection state. Empty until `connect`, cleared by
/// `disconnect`.
#[derive(Debug, Clone, Default)]
struct Session {
    user_id: String,
    room_id: Option<String>,
}

/// Room-scoped event relay over the shared broadcast channel.
///
/// Explicitly constructed and dependency-injected — the application root
/// owns one bus per context and tears it down with [`SignalBus::shutdown`]
/// (or by dropping it).
pub struct SignalBus {
    handle: ChannelHandle,
    session: Arc<RwLock<Session>>,
    registry: Arc<RwLock<Registry>>,
    next_listener: AtomicU64,
    pump: JoinHandle<()>,
}

impl SignalBus {
    /// Create a bus on the shared channel and start its inbound pump.
    ///
    /// The pump subscribes before this returns, so no envelope posted
    /// afterwards is missed.
    pub fn new(channel: &LocalChannel) -> Self {
        let handle = channel.handle();
        let session = Arc::new(RwLock::new(Session::default()));
        let registry: Arc<RwLock<Registry>> = Arc::new(RwLock::new(HashMap::new()));

        let sub = handle.subscribe();
        let pump = tokio::spawn(Self::pump(
            sub,
            handle.clone(),
            session.clone(),
            registry.clone(),
        ));

        Self {
            handle,
            session,
            registry,
            next_listener: AtomicU64::new(0),
            pump,
        }
    }

    /// Inbound pump: route every envelope from other contexts.
    async fn pump(
        mut sub: Subscription,
        handle: ChannelHandle,
        session: Arc<RwLock<Session>>,
        registry: Arc<RwLock<Registry>>,
    ) {
        while let Some(envelope) = sub.recv().await {
            // Discovery probe: answer if this context is joined to the
            // pinged room. Never forwarded to listeners.
            if envelope.event == SYSTEM_PING {
                let reply = {
                    let s = session.read().await;
                    if s.room_id.as_deref() == Some(envelope.room_id.as_str()) {
                        Some(Envelope::pong(&envelope.room_id, &s.user_id))
                    } else {
                        None
                    }
                };
                if let Some(pong) = reply {
                    log::debug!("answering discovery ping for room {}", envelope.room_id);
                    handle.post(&pong);
                }
                continue;
            }

            // Application path: only envelopes for the current room.
            let joined = {
                let s = session.read().await;
                s.room_id.as_deref() == Some(envelope.room_id.as_str())
            };
            if !joined {
                log::trace!(
                    "dropping {} for room {} (not joined)",
                    envelope.event,
                    envelope.room_id
                );
                continue;
            }

            // Clone callbacks out of the lock before invoking, so a
            // callback may call back into on/off without deadlocking.
            let callbacks: Vec<Listener> = {
                let reg = registry.read().await;
                reg.get(&envelope.event)
                    .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
                    .unwrap_or_default()
            };
            for cb in callbacks {
                cb(envelope.data.clone());
            }
        }
    }

    /// Join a room as `user_id`.
    ///
    /// Sets the session immediately; after [`JOIN_DELAY`] a `user:joined`
    /// envelope is broadcast into the room, provided the session still
    /// names it. Cannot fail.
    pub async fn connect(&self, user_id: impl Into<String>, room_id: impl Into<String>) {
        let user_id = user_id.into();
        let room_id = room_id.into();
        {
            let mut s = self.session.write().await;
            s.user_id = user_id.clone();
            s.room_id = Some(room_id.clone());
        }
        log::info!("connected as {user_id} in room {room_id}");

        let handle = self.handle.clone();
        let session = self.session.clone();
        tokio::spawn(async move {
            sleep(JOIN_DELAY).await;
            let still_joined = {
                let s = session.read().await;
                s.room_id.as_deref() == Some(room_id.as_str())
            };
            if still_joined {
                handle.post(&Envelope::user_joined(&room_id, &user_id));
            }
        });
    }

    /// Leave the current room.
    ///
    /// Broadcasts `user:left` if joined, then clears the session and the
    /// whole listener registry. Idempotent — when not connected this only
    /// clears the registry.
    pub async fn disconnect(&self) {
        let farewell = {
            let mut s = self.session.write().await;
            let farewell = s
                .room_id
                .take()
                .map(|room| Envelope::user_left(room, &s.user_id));
            s.user_id.clear();
            farewell
        };
        if let Some(envelope) = &farewell {
            self.handle.post(envelope);
            log::info!("disconnected from room {}", envelope.room_id);
        }
        self.registry.write().await.clear();
    }

    /// Broadcast an event into the current room.
    ///
    /// No-op when not joined to a room. Local listeners for the same
    /// event are not invoked (no local echo).
    pub async fn emit(&self, event: impl Into<String>, data: Value) {
        let room = { self.session.read().await.room_id.clone() };
        let Some(room) = room else { return };
        self.handle.post(&Envelope::new(room, event.into(), data));
    }

    /// Register a listener for an event name.
    ///
    /// Listeners for the same event fire in registration order.
    pub async fn on(
        &self,
        event: impl Into<String>,
        callback: impl Fn(Value) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.registry
            .write()
            .await
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Deregister one listener by its id. Other listeners for the same
    /// event are unaffected.
    pub async fn off(&self, event: &str, id: ListenerId) {
        let mut reg = self.registry.write().await;
        if let Some(list) = reg.get_mut(event) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                reg.remove(event);
            }
        }
    }

    /// Room discovery handshake: does any context currently claim `room_id`?
    ///
    /// Opens a temporary subscription, broadcasts `system:ping`, and
    /// resolves `true` on the first matching `system:pong` — or `false`
    /// after [`PROBE_TIMEOUT`]. The timeout is a normal negative result,
    /// not an error. The temporary subscription is dropped exactly once
    /// on either path.
    pub async fn check_room(&self, room_id: &str) -> bool {
        let mut probe = self.handle.subscribe();
        self.handle.post(&Envelope::ping(room_id));

        let wait_for_pong = async {
            while let Some(envelope) = probe.recv().await {
                if envelope.event == SYSTEM_PONG && envelope.room_id == room_id {
                    return true;
                }
            }
            false
        };

        match timeout(PROBE_TIMEOUT, wait_for_pong).await {
            Ok(found) => found,
            Err(_) => {
                log::debug!("no pong for room {room_id} within {PROBE_TIMEOUT:?}");
                false
            }
        }
    }

    /// Stop the inbound pump. After this the bus delivers nothing.
    pub fn shutdown(&self) {
        self.pump.abort();
    }

    // ─── Session accessors ────────────────────────────────────────────

    /// Current user id (empty when not connected).
    pub async fn user_id(&self) -> String {
        self.session.read().await.user_id.clone()
    }

    /// Current room, if joined.
    pub async fn room_id(&self) -> Option<String> {
        self.session.read().await.room_id.clone()
    }

    /// Whether the session currently names a room.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.room_id.is_some()
    }

    /// Number of listeners registered for an event.
    pub async fn listener_count(&self, event: &str) -> usize {
        self.registry
            .read()
            .await
            .get(event)
            .map_or(0, |list| list.len())
    }

    /// This bus's identity on the shared channel.
    pub fn context_id(&self) -> Uuid {
        self.handle.context_id()
    }
}

impl Drop for SignalBus {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
