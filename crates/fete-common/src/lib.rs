//! Shared building blocks for the fete live-collaboration layer: identity and
//! room-id types, the epoch-millis clock, and the error taxonomy used by both
//! the hub and the client.

pub mod errors;
pub mod id;
pub mod identity;
pub mod time;

pub use errors::{ConnectivityError, ProtocolError, TransportError};
pub use id::{new_id, EventId};
pub use identity::Identity;
pub use time::now_millis;
