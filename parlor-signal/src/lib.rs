//! # parlor-signal — in-process signaling bus for multi-context apps
//!
//! A local substitute for the signaling backend a multi-peer real-time app
//! would normally need. All "tabs" of one origin share a broadcast channel;
//! each tab drives a room-scoped bus over it:
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │ Context A│    │ Context B│    │ Context C│
//! │ SignalBus│    │ SignalBus│    │ SignalBus│
//! └────┬─────┘    └────┬─────┘    └────┬─────┘
//!      │               │               │
//!      └───────────────┼───────────────┘
//!                      ▼
//!               ┌─────────────┐
//!               │ LocalChannel│  (fan-out, no sender echo)
//!               └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — the `{roomId, event, data}` wire envelope and reserved
//!   event names
//! - [`channel`] — the shared broadcast primitive and per-context handles
//! - [`bus`] — session, listener registry, and the room discovery handshake
//!
//! Messaging is fire-and-forget; the only request/response exchange is the
//! `system:ping`/`system:pong` discovery handshake behind
//! [`SignalBus::check_room`].

pub mod bus;
pub mod channel;
pub mod protocol;

// Re-exports for convenience
pub use bus::{ListenerId, SignalBus, JOIN_DELAY, PROBE_TIMEOUT};
pub use channel::{ChannelHandle, LocalChannel, Subscription};
pub use protocol::{
    Envelope, SignalError, SYSTEM_PING, SYSTEM_PONG, USER_JOINED, USER_LEFT,
};
