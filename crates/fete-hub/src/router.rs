//! The hub: keeps registry and room directory in step and drives the
//! broadcaster.
//!
//! Every membership mutation runs to completion under one write lock before
//! the next inbound event is processed, so the registry's room sets and the
//! directory's member sets are always externally consistent and every PRESENCE
//! payload reflects the member set at the moment of the triggering event.

use std::sync::Arc;

use tokio::sync::RwLock;

use fete_common::{EventId, Identity};
use fete_protocol::{
    ClientMessage, JoinAckPayload, PresencePayload, PresenceStatus, ServerEnvelope, ServerMessage,
};

use crate::broadcast;
use crate::registry::{ConnectionRegistry, Outbound, RoomTx};
use crate::rooms::RoomDirectory;

#[derive(Default)]
struct HubState {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
}

impl HubState {
    /// Member identities of a room, resolved through the registry.
    fn member_identities(&self, room: &EventId) -> Vec<Identity> {
        self.rooms
            .members(room)
            .iter()
            .filter_map(|id| self.registry.get(id))
            .map(|conn| conn.identity.clone())
            .collect()
    }

    /// PRESENCE envelope for one member's transition, carrying the live member
    /// set of the room as of right now.
    fn presence(&self, who: &Identity, status: PresenceStatus, room: &EventId) -> ServerEnvelope {
        ServerEnvelope::new(ServerMessage::Presence(PresencePayload {
            identity_id: who.id.clone(),
            display_name: who.display_name.clone(),
            status,
            room_id: room.clone(),
            members: self.member_identities(room),
        }))
    }
}

/// Shared handle to the hub. Cheap to clone; one instance per process, owned
/// by whatever composes the listener.
#[derive(Clone, Default)]
pub struct Hub {
    state: Arc<RwLock<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// JOIN_ROOM: register (or refresh) the connection, add it to the room,
    /// broadcast PRESENCE to the whole room, then ack the joiner alone.
    /// A displaced transport is told to retire so its socket task winds down
    /// instead of lingering half-open.
    pub async fn join(&self, identity: Identity, room: EventId, transport: RoomTx) {
        let mut state = self.state.write().await;

        if let Some(displaced) = state.registry.register(identity.clone(), transport.clone()) {
            tracing::debug!(identity = %identity.id, "retiring displaced transport");
            let _ = displaced.try_send(Outbound::Retire);
        }
        if let Some(conn) = state.registry.get_mut(&identity.id) {
            conn.rooms.insert(room.clone());
        }
        state.rooms.join(&room, &identity.id);

        let presence = state.presence(&identity, PresenceStatus::Online, &room);
        broadcast::broadcast(&state.registry, &state.rooms.members(&room), &presence);

        let ack = ServerEnvelope::new(ServerMessage::JoinRoom(JoinAckPayload {
            room_id: room.clone(),
            success: true,
            members: state.member_identities(&room),
        }));
        broadcast::unicast(&transport, &ack);

        tracing::debug!(identity = %identity.id, room = %room, "joined room");
    }

    /// LEAVE_ROOM: drop the membership; tell the remaining members, if any.
    /// An emptied room is deleted and nothing is broadcast.
    pub async fn leave(&self, identity_id: &str, room: EventId) {
        let mut state = self.state.write().await;

        let Some(identity) = state.registry.get(identity_id).map(|c| c.identity.clone()) else {
            return;
        };
        let remaining = state.rooms.leave(&room, identity_id);
        if let Some(conn) = state.registry.get_mut(identity_id) {
            conn.rooms.remove(&room);
        }

        if remaining > 0 {
            let presence = state.presence(&identity, PresenceStatus::Offline, &room);
            broadcast::broadcast(&state.registry, &state.rooms.members(&room), &presence);
        }
        tracing::debug!(identity = %identity_id, room = %room, remaining, "left room");
    }

    /// Relay kinds (ROOM_UPDATE, ITEM_*, CHAT_MESSAGE, TYPING): re-wrap with
    /// the sender identity and a fresh timestamp, fan out verbatim to the room
    /// named in the payload.
    pub async fn relay(&self, sender_id: &str, message: ClientMessage) {
        let state = self.state.read().await;

        let Some(sender) = state.registry.get(sender_id).map(|c| c.identity.clone()) else {
            return;
        };
        let room = message.room_id().clone();
        let Some(relayed) = message.into_relay() else {
            return;
        };
        let envelope = ServerEnvelope::new(relayed).with_sender(sender);
        broadcast::broadcast(&state.registry, &state.rooms.members(&room), &envelope);
    }

    /// Transport close: leave every room, announce to the survivors, then
    /// unregister. Idempotent two ways — a second close for the same identity
    /// finds no registry entry, and a close from a transport the identity no
    /// longer owns (it reconnected; the old socket died late) is ignored so it
    /// cannot tear down the fresh connection.
    pub async fn disconnect(&self, identity_id: &str, transport: &RoomTx) {
        let mut state = self.state.write().await;

        let Some(conn) = state.registry.get(identity_id) else {
            return;
        };
        if !conn.transport.same_channel(transport) {
            tracing::debug!(identity = %identity_id, "ignoring close from a replaced transport");
            return;
        }
        let identity = conn.identity.clone();
        let affected = state.rooms.leave_all(identity_id);
        for room in &affected {
            // Emptied rooms were deleted; nobody left to tell.
            if !state.rooms.contains(room) {
                continue;
            }
            let presence = state.presence(&identity, PresenceStatus::Offline, room);
            broadcast::broadcast(&state.registry, &state.rooms.members(room), &presence);
        }
        state.registry.unregister(identity_id);

        tracing::info!(identity = %identity_id, rooms = affected.len(), "disconnected");
    }

    /// Entry point for collaborators outside the live channel: an HTTP write
    /// that must still notify the room goes through here.
    pub async fn notify_room(&self, room: &EventId, message: ServerMessage) {
        let state = self.state.read().await;
        let envelope = ServerEnvelope::new(message);
        broadcast::broadcast(&state.registry, &state.rooms.members(room), &envelope);
    }

    /// Member ids of a room, for external callers and tests.
    pub async fn members(&self, room: &EventId) -> Vec<String> {
        self.state.read().await.rooms.members(room)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.registry.len()
    }

    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.room_count()
    }
}
