//! Wire envelope for the shared broadcast channel.
//!
//! Every message exchanged between contexts is one JSON object:
//!
//! ```text
//! { "roomId": "abc123", "event": "chat:message", "data": { ... } }
//! ```
//!
//! Event names are caller-defined and opaque to the bus, except for the
//! reserved system and lifecycle names below. The `system:ping` /
//! `system:pong` pair implements room discovery without a central
//! directory: any context currently joined to the pinged room answers
//! on its behalf.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Room discovery probe. Answered by any context joined to the room.
pub const SYSTEM_PING: &str = "system:ping";
/// Room discovery answer, payload `{"responderId": ...}`.
pub const SYSTEM_PONG: &str = "system:pong";
/// Broadcast by the bus itself after `connect`, payload `{"userId": ...}`.
pub const USER_JOINED: &str = "user:joined";
/// Broadcast by the bus itself on `disconnect`, payload `{"userId": ...}`.
pub const USER_LEFT: &str = "user:left";

/// The unit of transport: a named event with payload, scoped to a room.
///
/// Envelopes are transient — owned by the broadcast medium during transit,
/// retained by no component after delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Room the envelope is addressed to. Never empty.
    pub room_id: String,
    /// Event name. Caller-defined unless reserved.
    pub event: String,
    /// Opaque payload, forwarded verbatim to listeners.
    pub data: Value,
}

impl Envelope {
    /// Create an envelope for an application event.
    pub fn new(room_id: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            room_id: room_id.into(),
            event: event.into(),
            data,
        }
    }

    /// Discovery probe for a room. The only envelope with an empty payload.
    pub fn ping(room_id: impl Into<String>) -> Self {
        Self::new(room_id, SYSTEM_PING, json!({}))
    }

    /// Discovery answer, carrying the responder's user id.
    pub fn pong(room_id: impl Into<String>, responder_id: &str) -> Self {
        Self::new(room_id, SYSTEM_PONG, json!({ "responderId": responder_id }))
    }

    /// Join notification emitted by the bus after `connect`.
    pub fn user_joined(room_id: impl Into<String>, user_id: &str) -> Self {
        Self::new(room_id, USER_JOINED, json!({ "userId": user_id }))
    }

    /// Leave notification emitted by the bus on `disconnect`.
    pub fn user_left(room_id: impl Into<String>, user_id: &str) -> Self {
        Self::new(room_id, USER_LEFT, json!({ "userId": user_id }))
    }

    /// Responder id carried by a `system:pong` envelope.
    pub fn responder_id(&self) -> Option<&str> {
        if self.event != SYSTEM_PONG {
            return None;
        }
        self.data.get("responderId").and_then(Value::as_str)
    }

    /// Serialize to the JSON wire format.
    pub fn encode(&self) -> Result<Vec<u8>, SignalError> {
        serde_json::to_vec(self).map_err(|e| SignalError::Serialization(e.to_string()))
    }

    /// Deserialize from the JSON wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, SignalError> {
        serde_json::from_slice(bytes).map_err(|e| SignalError::Deserialization(e.to_string()))
    }
}

/// Transport-layer errors.
///
/// None of these surface through the bus API — the bus is never-throwing
/// toward its callers. They exist for the channel internals, which log
/// and drop rather than propagate.
#[derive(Debug, Clone)]
pub enum SignalError {
    /// Envelope could not be serialized
    Serialization(String),
    /// Received frame could not be deserialized
    Deserialization(String),
    /// The shared channel has no more senders
    ChannelClosed,
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "Serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "Deserialization error: {e}"),
            Self::ChannelClosed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for SignalError {}
