//! Room directory: event id → current member set.
//!
//! Rooms are created on first join and deleted the instant their member set
//! empties — the directory never holds an empty room.

use std::collections::{HashMap, HashSet};

use fete_common::EventId;

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<EventId, HashSet<String>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the identity, creating the room if absent. Returns false if it was
    /// already a member.
    pub fn join(&mut self, room: &EventId, identity_id: &str) -> bool {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(identity_id.to_string())
    }

    /// Remove the identity; deletes the room if now empty. Returns the number
    /// of members remaining.
    pub fn leave(&mut self, room: &EventId, identity_id: &str) -> usize {
        let Some(members) = self.rooms.get_mut(room) else {
            return 0;
        };
        members.remove(identity_id);
        let remaining = members.len();
        if remaining == 0 {
            self.rooms.remove(room);
        }
        remaining
    }

    /// Member ids of a room; empty when the room is unknown (not an error).
    pub fn members(&self, room: &EventId) -> Vec<String> {
        self.rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room: &EventId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Remove the identity from every room (disconnect path), returning the
    /// ids of the rooms it was in.
    pub fn leave_all(&mut self, identity_id: &str) -> Vec<EventId> {
        let mut affected = Vec::new();
        self.rooms.retain(|room, members| {
            if members.remove(identity_id) {
                affected.push(room.clone());
            }
            !members.is_empty()
        });
        affected
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
