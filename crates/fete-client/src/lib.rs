//! Client side of the fete live channel: the connection lifecycle state
//! machine, presence tracking, and the [`LiveClient`] handle consumed by view
//! code.
//!
//! The lifecycle retries a bounded number of times and then degrades: the API
//! stays callable with the same shapes, but calls update local state only and
//! report `false`. View code never branches on degraded vs. connected by
//! return type — only via [`LiveClient::is_degraded`].

pub mod client;
mod lifecycle;
pub mod presence;
pub mod transport;
pub mod types;

pub use client::LiveClient;
pub use presence::PresenceTracker;
pub use transport::{ChannelRx, ChannelTx, Connector, WsConnector};
pub use types::{ClientConfig, ClientEvent, LinkState};
