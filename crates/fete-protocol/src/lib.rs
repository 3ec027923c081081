//! Wire protocol for the fete live channel.
//!
//! Every frame is a JSON envelope:
//!
//! ```json
//! {
//!   "type": "CHAT_MESSAGE",
//!   "payload": { "roomId": "...", ... },
//!   "sender": { "id": "...", "displayName": "..." },
//!   "timestamp": 1724900000000
//! }
//! ```
//!
//! The message unions are split by direction — [`ClientMessage`] for frames the
//! hub accepts, [`ServerMessage`] for frames it emits — so each side's payloads
//! are closed and statically typed. A client frame whose `type` is not in
//! [`ClientMessage`] fails to parse and is answered with an ERROR envelope.
//! `sender` and `timestamp` are hub-assigned on relay; a client→hub join carries
//! neither.

use serde::{Deserialize, Serialize};

use fete_common::{now_millis, EventId, Identity};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// A frame travelling client → hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(flatten)]
    pub message: ClientMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ClientEnvelope {
    pub fn new(message: ClientMessage) -> Self {
        Self {
            message,
            sender: None,
            timestamp: None,
        }
    }
}

/// A frame travelling hub → client. The hub stamps every outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(flatten)]
    pub message: ServerMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Identity>,
    pub timestamp: i64,
}

impl ServerEnvelope {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            sender: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_sender(mut self, sender: Identity) -> Self {
        self.sender = Some(sender);
        self
    }
}

// ---------------------------------------------------------------------------
// Message unions
// ---------------------------------------------------------------------------

/// Frames the hub accepts from clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    JoinRoom(JoinRoomPayload),
    LeaveRoom(LeaveRoomPayload),
    RoomUpdate(RelayPayload),
    ItemCreate(RelayPayload),
    ItemUpdate(RelayPayload),
    ItemDelete(RelayPayload),
    ChatMessage(RelayPayload),
    Typing(RelayPayload),
}

impl ClientMessage {
    /// The room this message targets. Every client kind names one.
    pub fn room_id(&self) -> &EventId {
        match self {
            Self::JoinRoom(p) => &p.room_id,
            Self::LeaveRoom(p) => &p.room_id,
            Self::RoomUpdate(p)
            | Self::ItemCreate(p)
            | Self::ItemUpdate(p)
            | Self::ItemDelete(p)
            | Self::ChatMessage(p)
            | Self::Typing(p) => &p.room_id,
        }
    }

    /// Wire name of the kind, for logs and error envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "JOIN_ROOM",
            Self::LeaveRoom(_) => "LEAVE_ROOM",
            Self::RoomUpdate(_) => "ROOM_UPDATE",
            Self::ItemCreate(_) => "ITEM_CREATE",
            Self::ItemUpdate(_) => "ITEM_UPDATE",
            Self::ItemDelete(_) => "ITEM_DELETE",
            Self::ChatMessage(_) => "CHAT_MESSAGE",
            Self::Typing(_) => "TYPING",
        }
    }

    /// Re-wrap a relay kind for fan-out, payload untouched. `None` for the two
    /// membership kinds, which the router consumes itself.
    pub fn into_relay(self) -> Option<ServerMessage> {
        match self {
            Self::RoomUpdate(p) => Some(ServerMessage::RoomUpdate(p)),
            Self::ItemCreate(p) => Some(ServerMessage::ItemCreate(p)),
            Self::ItemUpdate(p) => Some(ServerMessage::ItemUpdate(p)),
            Self::ItemDelete(p) => Some(ServerMessage::ItemDelete(p)),
            Self::ChatMessage(p) => Some(ServerMessage::ChatMessage(p)),
            Self::Typing(p) => Some(ServerMessage::Typing(p)),
            Self::JoinRoom(_) | Self::LeaveRoom(_) => None,
        }
    }
}

/// Frames the hub emits to clients. `JoinRoom` here is the join acknowledgment,
/// unicast to the joining transport only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    JoinRoom(JoinAckPayload),
    RoomUpdate(RelayPayload),
    ItemCreate(RelayPayload),
    ItemUpdate(RelayPayload),
    ItemDelete(RelayPayload),
    ChatMessage(RelayPayload),
    Typing(RelayPayload),
    Presence(PresencePayload),
    Error(ErrorPayload),
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Client → hub JOIN_ROOM. The identity comes from the auth layer; the hub
/// registers the connection under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: EventId,
    pub identity: Identity,
}

/// Client → hub LEAVE_ROOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomPayload {
    pub room_id: EventId,
}

/// Payload of the six relay kinds. The hub requires only the room id; the rest
/// is opaque domain data forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub room_id: EventId,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl RelayPayload {
    pub fn new(room_id: EventId) -> Self {
        Self {
            room_id,
            data: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }
}

/// Hub → joining client acknowledgment, unicast only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAckPayload {
    pub room_id: EventId,
    pub success: bool,
    pub members: Vec<Identity>,
}

/// Online/offline transition of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Hub → room PRESENCE broadcast. `members` is the full member set at the
/// moment of the triggering join/leave/disconnect, never a stale snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub identity_id: String,
    pub display_name: String,
    pub status: PresenceStatus,
    pub room_id: EventId,
    pub members: Vec<Identity>,
}

/// Hub → offending client ERROR, unicast only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}
