//! Connection registry: one live transport per identity.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;

use fete_common::{EventId, Identity};

/// What the hub pushes into a connection's outbox. `Retire` tells a socket
/// task that its identity re-registered on a newer transport and it should
/// shut down.
#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    Retire,
}

/// Outbound handle for a connected client: a channel into its socket task.
pub type RoomTx = mpsc::Sender<Outbound>;

/// One registered client connection.
#[derive(Debug)]
pub struct Connection {
    pub identity: Identity,
    pub transport: RoomTx,
    pub rooms: HashSet<EventId>,
}

/// Identity id → live connection. Plain synchronous map; the router serializes
/// all access, so no interior locking here.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the identity's entry. Replacing transfers the old
    /// entry's room set onto the new connection and returns the displaced
    /// transport; closing it is the caller's job.
    pub fn register(&mut self, identity: Identity, transport: RoomTx) -> Option<RoomTx> {
        let old = self.connections.remove(&identity.id);
        let rooms = old.as_ref().map(|c| c.rooms.clone()).unwrap_or_default();
        self.connections.insert(
            identity.id.clone(),
            Connection {
                identity,
                transport,
                rooms,
            },
        );
        old.map(|c| c.transport)
    }

    /// Remove and return the entry, if present.
    pub fn unregister(&mut self, identity_id: &str) -> Option<Connection> {
        self.connections.remove(identity_id)
    }

    pub fn get(&self, identity_id: &str) -> Option<&Connection> {
        self.connections.get(identity_id)
    }

    pub fn get_mut(&mut self, identity_id: &str) -> Option<&mut Connection> {
        self.connections.get_mut(identity_id)
    }

    pub fn contains(&self, identity_id: &str) -> bool {
        self.connections.contains_key(identity_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
