//! History replay guard.
//!
//! Every join is answered by one `previous_messages` batch, in join order,
//! on the same connection. Remembering which room each outstanding join was
//! for lets us drop batches that arrive after the user already moved on.

use std::collections::VecDeque;

use crate::models::ChatMessage;

#[derive(Debug, Default)]
pub struct HistoryGuard {
    /// Rooms of joins still waiting for their batch, oldest first.
    awaiting: VecDeque<String>,
}

impl HistoryGuard {
    /// Forget outstanding joins. Called on every (re)connect because
    /// answers for the previous connection will never arrive.
    pub fn reset(&mut self) {
        self.awaiting.clear();
    }

    /// Record a join that expects a history batch.
    pub fn expect(&mut self, room: &str) {
        self.awaiting.push_back(room.to_string());
    }

    /// Decide whether a batch may replace the view while in `current_room`.
    ///
    /// The batch is matched with the oldest outstanding join. With nothing
    /// outstanding, it is accepted only if all its messages belong to the
    /// current room.
    pub fn accept(&mut self, batch: &[ChatMessage], current_room: &str) -> bool {
        match self.awaiting.pop_front() {
            Some(room) => room == current_room,
            None => batch
                .iter()
                .all(|m| m.room.is_empty() || m.room == current_room),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.awaiting.len()
    }
}
