//! Room membership: the single joined room and its persistence.

use crate::config::RoomStore;
use crate::models::RoomRequest;
use crate::socketio::{Emitter, OutboundEvent};

/// Tracks the one room this client is in.
pub struct RoomMembership {
    current: String,
    store: Box<dyn RoomStore + Send>,
}

impl RoomMembership {
    /// Start in the persisted room, or `default_room` if none was saved.
    pub fn new(store: Box<dyn RoomStore + Send>, default_room: &str) -> Self {
        let current = store
            .load_room()
            .unwrap_or_else(|| default_room.to_string());
        tracing::debug!("Starting in room {}", current);
        Self { current, store }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Move to `room`: leave the old one, persist, then join the new one.
    ///
    /// The leave goes out before the join so the server never has us in
    /// both broadcast sets. Returns false (and emits nothing) when already
    /// in `room`.
    pub fn switch_room(&mut self, room: &str, out: &mut impl Emitter) -> bool {
        if room == self.current {
            return false;
        }

        out.emit(OutboundEvent::Leave(RoomRequest::new(self.current.clone())));
        tracing::info!("Switching room {} -> {}", self.current, room);
        self.current = room.to_string();
        if let Err(e) = self.store.save_room(&self.current) {
            tracing::warn!("Could not persist room selection: {:#}", e);
        }
        out.emit(OutboundEvent::Join(RoomRequest::new(self.current.clone())));
        true
    }

    /// (Re)join the current room after the transport (re)connects.
    pub fn on_connected(&self, out: &mut impl Emitter) {
        tracing::info!("Joining room {}", self.current);
        out.emit(OutboundEvent::Join(RoomRequest::new(self.current.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryRoomStore;

    fn join(room: &str) -> OutboundEvent {
        OutboundEvent::Join(RoomRequest::new(room))
    }

    fn leave(room: &str) -> OutboundEvent {
        OutboundEvent::Leave(RoomRequest::new(room))
    }

    #[test]
    fn test_default_room_without_saved_selection() {
        let membership = RoomMembership::new(Box::new(MemoryRoomStore::default()), "Medical");
        assert_eq!(membership.current(), "Medical");
    }

    #[test]
    fn test_saved_selection_wins() {
        let store = MemoryRoomStore::with_room("Triage");
        let membership = RoomMembership::new(Box::new(store), "Medical");
        assert_eq!(membership.current(), "Triage");
    }

    #[test]
    fn test_switch_emits_leave_before_join_and_persists() {
        let store = MemoryRoomStore::default();
        let mut membership = RoomMembership::new(Box::new(store.clone()), "Medical");
        let mut out: Vec<OutboundEvent> = Vec::new();

        assert!(membership.switch_room("Security", &mut out));
        assert_eq!(out, vec![leave("Medical"), join("Security")]);
        assert_eq!(membership.current(), "Security");
        assert_eq!(store.saved().as_deref(), Some("Security"));
    }

    #[test]
    fn test_switch_to_same_room_is_noop() {
        let mut membership = RoomMembership::new(Box::new(MemoryRoomStore::default()), "Medical");
        let mut out: Vec<OutboundEvent> = Vec::new();

        assert!(membership.switch_room("Triage", &mut out));
        out.clear();
        assert!(!membership.switch_room("Triage", &mut out));
        assert!(!membership.switch_room("Triage", &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn test_reconnect_rejoins_without_leave() {
        let store = MemoryRoomStore::with_room("Triage");
        let membership = RoomMembership::new(Box::new(store), "Medical");
        let mut out: Vec<OutboundEvent> = Vec::new();

        membership.on_connected(&mut out);
        assert_eq!(out, vec![join("Triage")]);
    }

    #[test]
    fn test_selection_survives_restart() {
        let store = MemoryRoomStore::default();
        {
            let mut membership = RoomMembership::new(Box::new(store.clone()), "Medical");
            membership.switch_room("Command", &mut Vec::<OutboundEvent>::new());
        }
        let membership = RoomMembership::new(Box::new(store), "Medical");
        assert_eq!(membership.current(), "Command");
    }
}
