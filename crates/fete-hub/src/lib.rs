//! Room-based broadcast hub: the server side of the fete live channel.
//!
//! Clients viewing the same event join a room keyed by the event id; the hub
//! fans presence, edits, chat, and typing out to every live member. Everything
//! is in-memory and wire-level — domain persistence, auth, and HTTP CRUD live
//! elsewhere and call in through [`Hub::notify_room`].

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod rooms;
pub mod router;

pub use router::Hub;
