//! Configuration, lifecycle states, events, and commands for the live client.

use std::time::Duration;

use tokio::sync::oneshot;

use fete_common::{EventId, Identity};
use fete_protocol::{ClientMessage, ServerEnvelope};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the live client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the hub.
    pub url: String,
    /// Consecutive failed attempts before the session degrades.
    pub max_attempts: u32,
    /// Fixed interval between reconnect attempts.
    pub retry_delay: Duration,
    /// Bound on a single transport-establishment attempt.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle state
// ---------------------------------------------------------------------------

/// Connection lifecycle states.
///
/// `Degraded` is terminal for the session: the retry budget is spent and the
/// loop performs no further network I/O until an explicit `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Degraded,
}

// ---------------------------------------------------------------------------
// Events & commands
// ---------------------------------------------------------------------------

/// Events emitted for the view layer to consume.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Live channel established.
    Connected,
    /// Live channel lost (a reconnect may follow).
    Disconnected,
    /// Retry budget exhausted; the session is now degraded. Fired once per
    /// degradation.
    ConnectivityLimited,
    /// A later explicit connect succeeded after degrading. Fired once.
    ConnectivityRestored,
    /// Active-room membership changed.
    Presence {
        room_id: EventId,
        members: Vec<Identity>,
    },
    /// A relayed domain message (edits, chat, typing) for the active room.
    Message(ServerEnvelope),
    Error(String),
}

/// Commands from the handle to the connection task. The membership and send
/// commands carry a reply slot so callers get a success flag back.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    JoinRoom {
        room: EventId,
        reply: oneshot::Sender<bool>,
    },
    LeaveRoom {
        room: EventId,
        reply: oneshot::Sender<bool>,
    },
    Send {
        message: ClientMessage,
        reply: oneshot::Sender<bool>,
    },
}
