//! Last-known membership of the active room, as asserted by the hub.
//!
//! Pure derived state: replaced wholesale by each PRESENCE or join-ack member
//! list, cleared on leave. In degraded mode the list is synthesized as the
//! local caller alone.

use fete_common::{EventId, Identity};

#[derive(Debug, Default)]
pub struct PresenceTracker {
    active_room: Option<EventId>,
    members: Vec<Identity>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The room whose membership is tracked — the most recently joined one.
    pub fn active_room(&self) -> Option<&EventId> {
        self.active_room.as_ref()
    }

    pub fn members(&self) -> &[Identity] {
        &self.members
    }

    /// Make `room` the active room (a join was acknowledged for it).
    pub fn set_active(&mut self, room: EventId) {
        if self.active_room.as_ref() != Some(&room) {
            self.active_room = Some(room);
            self.members.clear();
        }
    }

    /// Replace the member list wholesale, if the update is for the active
    /// room. Updates for other rooms are ignored.
    pub fn replace(&mut self, room: &EventId, members: Vec<Identity>) -> bool {
        if self.active_room.as_ref() != Some(room) {
            return false;
        }
        self.members = members;
        true
    }

    /// Forget everything — the room was left or the channel went away.
    pub fn clear(&mut self) {
        self.active_room = None;
        self.members.clear();
    }

    /// Degraded-mode synthesis: the caller alone.
    pub fn set_local_only(&mut self, room: EventId, me: Identity) {
        self.active_room = Some(room);
        self.members = vec![me];
    }
}
