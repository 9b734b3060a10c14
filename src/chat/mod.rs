//! Room-scoped chat core.
//!
//! `ChatClient` is driven by a single event loop: transport events and user
//! actions are handed to it one at a time, and everything it wants to say to
//! the server goes out through an `Emitter`. It never renders a message that
//! the server did not send back.

pub mod console;
pub mod history;
pub mod render;
pub mod room;
pub mod view;

use anyhow::Result;

use crate::config::{Config, Identity, MemoryRoomStore, RoomStore, StateFile};
use crate::models::{ChatMessage, SendMessage};
use crate::socketio::{Emitter, OutboundEvent, TransportEvent};

use history::HistoryGuard;
use room::RoomMembership;
use view::MessageView;

/// What a handled event did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Unchanged,
    /// View cleared and refilled from a history batch.
    Replaced,
    /// One message appended at the end.
    Appended,
    /// A history batch for a room we already left was dropped.
    DiscardedStale,
}

impl ViewChange {
    /// Whether the viewer should scroll to the newest message.
    pub fn follows_latest(self) -> bool {
        matches!(self, ViewChange::Replaced | ViewChange::Appended)
    }
}

pub struct ChatClient {
    identity: Identity,
    membership: RoomMembership,
    history: HistoryGuard,
    view: MessageView,
    connected: bool,
}

impl ChatClient {
    pub fn new(identity: Identity, membership: RoomMembership) -> Self {
        Self {
            identity,
            membership,
            history: HistoryGuard::default(),
            view: MessageView::default(),
            connected: false,
        }
    }

    /// Client for the configured identity, remembering its room in the
    /// default state file.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_in(config, None)
    }

    /// Like `open`, but a given `room` is used for this run only. Room
    /// changes then stay in memory and the saved room is left alone.
    pub fn open_in(config: &Config, room: Option<&str>) -> Result<Self> {
        let identity = config.identity()?;
        let store: Box<dyn RoomStore + Send> = match room {
            Some(room) => {
                anyhow::ensure!(!room.is_empty(), "Room name is empty");
                Box::new(MemoryRoomStore::with_room(room))
            }
            None => Box::new(StateFile::open_default()?),
        };
        let membership = RoomMembership::new(store, &config.default_room);
        Ok(Self::new(identity, membership))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn current_room(&self) -> &str {
        self.membership.current()
    }

    pub fn view(&self) -> &MessageView {
        &self.view
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Process one transport event.
    pub fn handle(&mut self, event: TransportEvent, out: &mut impl Emitter) -> ViewChange {
        match event {
            TransportEvent::Connected { sid } => {
                tracing::debug!("Transport connected (sid={})", sid);
                self.on_connected(out);
                ViewChange::Unchanged
            }
            TransportEvent::Disconnected { reason } => {
                tracing::info!("Transport disconnected: {}", reason);
                self.connected = false;
                ViewChange::Unchanged
            }
            TransportEvent::PreviousMessages(batch) => self.load_history(batch),
            TransportEvent::ReceiveMessage(message) => self.ingest(message),
        }
    }

    /// Join the current room on every (re)connect.
    pub fn on_connected(&mut self, out: &mut impl Emitter) {
        self.connected = true;
        self.history.reset();
        self.membership.on_connected(out);
        self.history.expect(self.membership.current());
    }

    /// Move to another room. The view is refreshed by the history batch
    /// the server sends for the new join.
    pub fn switch_room(&mut self, room: &str, out: &mut impl Emitter) -> bool {
        let switched = self.membership.switch_room(room, out);
        if switched {
            self.history.expect(room);
        }
        switched
    }

    /// Replace the view with a history batch, unless it is stale.
    pub fn load_history(&mut self, batch: Vec<ChatMessage>) -> ViewChange {
        if !self.history.accept(&batch, self.membership.current()) {
            tracing::debug!(
                "Discarding stale history batch ({} messages) while in {}, {} joins outstanding",
                batch.len(),
                self.membership.current(),
                self.history.outstanding()
            );
            return ViewChange::DiscardedStale;
        }
        let own = self.identity.assignment.as_str();
        self.view
            .replace(batch.iter().map(|m| render::render(m, own)));
        tracing::debug!("Loaded {} history messages", self.view.len());
        ViewChange::Replaced
    }

    /// Append a live message. Room scoping is the server's job.
    pub fn ingest(&mut self, message: ChatMessage) -> ViewChange {
        self.view
            .push(render::render(&message, &self.identity.assignment));
        ViewChange::Appended
    }

    /// Send the composed text and clear the input.
    ///
    /// An empty input is ignored. Nothing is added to the view here: the
    /// message shows up once the server echoes it back.
    pub fn submit(&mut self, input: &mut String, out: &mut impl Emitter) -> bool {
        if input.is_empty() {
            return false;
        }
        let message = std::mem::take(input);
        out.emit(OutboundEvent::SendMessage(SendMessage {
            message,
            room: self.membership.current().to_string(),
            assignment: self.identity.assignment.clone(),
            username: self.identity.username.clone(),
        }));
        true
    }
}
