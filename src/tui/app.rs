//! TUI application state and main event loop

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use std::time::Duration;

use super::compose::ComposeState;
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::rooms::RoomsState;
use super::ui;
use crate::chat::ChatClient;
use crate::config::Config;
use crate::socketio::{Emitter, Transport, TransportEvent, TransportHandle};

/// Redraw interval when nothing else happens (debug log, clock).
const TICK: Duration = Duration::from_millis(250);

/// Lines moved by PageUp/PageDown.
const PAGE_LINES: usize = 10;

/// Active pane in the TUI
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pane {
    Rooms,
    Messages,
    #[default]
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Rooms => "rooms",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Rooms => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Rooms,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Rooms => Pane::Compose,
            Pane::Messages => Pane::Rooms,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Transport state as shown in the header and status bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Online,
    Offline(String),
}

impl ConnectionState {
    pub fn is_online(&self) -> bool {
        *self == ConnectionState::Online
    }

    pub fn label(&self) -> String {
        match self {
            ConnectionState::Connecting => "connecting".to_string(),
            ConnectionState::Online => "online".to_string(),
            ConnectionState::Offline(reason) => format!("offline ({})", reason),
        }
    }
}

/// Application state
pub struct App {
    pub should_exit: bool,
    pub client: ChatClient,
    pub rooms: RoomsState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub debug_log: DebugLogState,
    pub active_pane: Pane,
    pub connection: ConnectionState,
    pub show_help: bool,
    /// One-shot notice in the status bar, cleared by the next key.
    pub status_message: Option<String>,
    pub status_is_error: bool,
}

impl App {
    pub fn new(client: ChatClient, rooms: RoomsState, debug_log: DebugLogState) -> Self {
        Self {
            should_exit: false,
            client,
            rooms,
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            debug_log,
            active_pane: Pane::default(),
            connection: ConnectionState::Connecting,
            show_help: false,
            status_message: None,
            status_is_error: false,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>, is_error: bool) {
        self.status_message = Some(msg.into());
        self.status_is_error = is_error;
    }

    /// Feed one transport event into the chat core.
    pub fn handle_transport(&mut self, event: TransportEvent, out: &mut impl Emitter) {
        match &event {
            TransportEvent::Connected { .. } => self.connection = ConnectionState::Online,
            TransportEvent::Disconnected { reason } => {
                self.connection = ConnectionState::Offline(reason.clone())
            }
            _ => {}
        }
        let change = self.client.handle(event, out);
        if change.follows_latest() {
            self.messages.follow_latest();
        }
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent, out: &mut impl Emitter) {
        if self.show_help {
            self.show_help = false;
            return;
        }
        self.status_message = None;

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_exit = true;
                return;
            }
            KeyCode::F(12) => {
                self.debug_log.toggle();
                return;
            }
            KeyCode::Tab => {
                self.active_pane = self.active_pane.next();
                return;
            }
            KeyCode::BackTab => {
                self.active_pane = self.active_pane.prev();
                return;
            }
            KeyCode::PageUp if self.debug_log.visible && shift => {
                self.debug_log.scroll_back(PAGE_LINES);
                return;
            }
            KeyCode::PageDown if self.debug_log.visible && shift => {
                self.debug_log.scroll_forward(PAGE_LINES);
                return;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Compose => self.handle_compose_key(key, out),
            Pane::Rooms => self.handle_rooms_key(key, out),
            Pane::Messages => self.handle_messages_key(key),
        }
    }

    /// Keys that apply outside the compose box.
    fn handle_global_char(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            _ => return false,
        }
        true
    }

    fn handle_rooms_key(&mut self, key: KeyEvent, out: &mut impl Emitter) {
        if self.handle_global_char(key) {
            return;
        }
        match key.code {
            KeyCode::Up => self.rooms.move_up(),
            KeyCode::Down => self.rooms.move_down(),
            KeyCode::Enter => {
                let Some(room) = self.rooms.selected_room().map(str::to_string) else {
                    return;
                };
                if self.client.switch_room(&room, out) {
                    self.set_status(format!("Joined {}", room), false);
                    self.active_pane = Pane::Compose;
                }
            }
            _ => {}
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent) {
        if self.handle_global_char(key) {
            return;
        }
        match key.code {
            KeyCode::Up => self.messages.scroll_up(1),
            KeyCode::Down => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(PAGE_LINES),
            KeyCode::PageDown => self.messages.scroll_down(PAGE_LINES),
            KeyCode::Home => self.messages.scroll_to_top(),
            KeyCode::End => self.messages.follow_latest(),
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent, out: &mut impl Emitter) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => {
                if self.client.submit(&mut self.compose.input, out) {
                    self.compose.sync_cursor();
                    if !self.connection.is_online() {
                        self.set_status("Offline: message queued", true);
                    }
                }
            }
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Esc => self.active_pane = Pane::Messages,
            _ => {}
        }
    }

    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run the TUI until the user quits.
pub async fn run(config: Config, log_buffer: LogBuffer) -> Result<()> {
    let client = ChatClient::open(&config)?;
    let rooms = RoomsState::new(config.rooms.clone(), client.current_room());
    let mut app = App::new(client, rooms, DebugLogState::new(log_buffer));

    let mut transport = Transport::start(config.transport_settings());
    let mut handle = transport.handle.clone();

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, &mut app, &mut transport, &mut handle).await;
    ratatui::restore();

    drop(handle);
    transport.shutdown().await;
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    transport: &mut Transport,
    handle: &mut TransportHandle,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);

    while !app.should_exit {
        app.debug_log.refresh();
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            _ = ticker.tick() => {}
            event = transport.events.recv() => {
                match event {
                    Some(event) => app.handle_transport(event, handle),
                    None => {
                        tracing::error!("Transport stopped");
                        app.should_exit = true;
                    }
                }
            }
            maybe_event = input.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        app.handle_key(key, handle);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => app.should_exit = true,
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::{client_in, message};
    use crate::models::{RoomRequest, SendMessage};
    use crate::socketio::OutboundEvent;
    use ratatui::{backend::TestBackend, Terminal};

    fn app() -> App {
        let client = client_in(Some("Medical"), "Medical");
        let rooms = RoomsState::new(
            vec!["Medical".into(), "Triage".into(), "Security".into()],
            client.current_room(),
        );
        App::new(client, rooms, DebugLogState::new(LogBuffer::new()))
    }

    fn press(app: &mut App, code: KeyCode, out: &mut Vec<OutboundEvent>) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), out);
    }

    fn ctrl(app: &mut App, c: char, out: &mut Vec<OutboundEvent>) {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL), out);
    }

    fn type_text(app: &mut App, text: &str, out: &mut Vec<OutboundEvent>) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), out);
        }
    }

    fn connect(app: &mut App, out: &mut Vec<OutboundEvent>) {
        app.handle_transport(TransportEvent::Connected { sid: "s1".into() }, out);
        out.clear();
    }

    #[test]
    fn test_tab_cycles_panes() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        assert_eq!(app.active_pane, Pane::Compose);
        press(&mut app, KeyCode::Tab, &mut out);
        assert_eq!(app.active_pane, Pane::Rooms);
        press(&mut app, KeyCode::Tab, &mut out);
        assert_eq!(app.active_pane, Pane::Messages);
        press(&mut app, KeyCode::BackTab, &mut out);
        assert_eq!(app.active_pane, Pane::Rooms);
    }

    #[test]
    fn test_q_types_in_compose_but_quits_elsewhere() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        press(&mut app, KeyCode::Char('q'), &mut out);
        assert!(!app.should_exit);
        assert_eq!(app.compose.input, "q");

        app.active_pane = Pane::Messages;
        press(&mut app, KeyCode::Char('q'), &mut out);
        assert!(app.should_exit);
    }

    #[test]
    fn test_ctrl_c_quits_from_compose() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        ctrl(&mut app, 'c', &mut out);
        assert!(app.should_exit);
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_enter_sends_and_clears_compose() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);

        type_text(&mut app, "need a stretcher", &mut out);
        press(&mut app, KeyCode::Enter, &mut out);

        assert_eq!(
            out,
            vec![OutboundEvent::SendMessage(SendMessage {
                message: "need a stretcher".into(),
                room: "Medical".into(),
                assignment: "Medical".into(),
                username: "Casey".into(),
            })]
        );
        assert!(app.compose.input.is_empty());
        assert_eq!(app.compose.cursor, 0);
        // Not rendered until the server echoes it.
        assert!(app.client.view().is_empty());
        assert!(app.status_message.is_none());
    }

    #[test]
    fn test_enter_on_empty_compose_sends_nothing() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        press(&mut app, KeyCode::Enter, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_send_while_offline_is_queued_with_notice() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        type_text(&mut app, "hello", &mut out);
        press(&mut app, KeyCode::Enter, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(
            app.status_message.as_deref(),
            Some("Offline: message queued")
        );
        assert!(app.status_is_error);
    }

    #[test]
    fn test_ctrl_u_clears_compose() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        type_text(&mut app, "draft", &mut out);
        ctrl(&mut app, 'u', &mut out);
        assert!(app.compose.input.is_empty());
    }

    #[test]
    fn test_enter_in_rooms_switches_room() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        app.active_pane = Pane::Rooms;

        press(&mut app, KeyCode::Down, &mut out);
        press(&mut app, KeyCode::Enter, &mut out);

        assert_eq!(
            out,
            vec![
                OutboundEvent::Leave(RoomRequest::new("Medical")),
                OutboundEvent::Join(RoomRequest::new("Triage")),
            ]
        );
        assert_eq!(app.client.current_room(), "Triage");
        assert_eq!(app.active_pane, Pane::Compose);
    }

    #[test]
    fn test_enter_on_current_room_is_noop() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        app.active_pane = Pane::Rooms;
        press(&mut app, KeyCode::Enter, &mut out);
        assert!(out.is_empty());
        assert_eq!(app.active_pane, Pane::Rooms);
    }

    #[test]
    fn test_transport_events_update_connection_state() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        assert_eq!(app.connection, ConnectionState::Connecting);

        app.handle_transport(TransportEvent::Connected { sid: "s1".into() }, &mut out);
        assert!(app.connection.is_online());
        assert_eq!(out, vec![OutboundEvent::Join(RoomRequest::new("Medical"))]);

        app.handle_transport(
            TransportEvent::Disconnected {
                reason: "ping timeout".into(),
            },
            &mut out,
        );
        assert_eq!(
            app.connection,
            ConnectionState::Offline("ping timeout".into())
        );
        assert_eq!(app.connection.label(), "offline (ping timeout)");
    }

    #[test]
    fn test_new_message_follows_latest() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        app.messages.scroll_up(5);

        app.handle_transport(
            TransportEvent::ReceiveMessage(message("Medical", "Triage", "inbound")),
            &mut out,
        );
        assert_eq!(app.messages.scroll_back, 0);
        assert_eq!(app.client.view().len(), 1);
    }

    #[test]
    fn test_stale_history_keeps_scroll() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        app.active_pane = Pane::Rooms;
        press(&mut app, KeyCode::Down, &mut out);
        press(&mut app, KeyCode::Enter, &mut out);
        app.messages.scroll_up(3);

        // History for Medical (joined on connect) arrives after the switch.
        app.handle_transport(
            TransportEvent::PreviousMessages(vec![message("Medical", "Medical", "old")]),
            &mut out,
        );
        assert!(app.client.view().is_empty());
        assert_eq!(app.messages.scroll_back, 3);
    }

    #[test]
    fn test_messages_pane_scrolling() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        app.active_pane = Pane::Messages;
        press(&mut app, KeyCode::PageUp, &mut out);
        press(&mut app, KeyCode::Up, &mut out);
        assert_eq!(app.messages.scroll_back, PAGE_LINES + 1);
        press(&mut app, KeyCode::End, &mut out);
        assert_eq!(app.messages.scroll_back, 0);
    }

    #[test]
    fn test_page_down_after_home_moves_view() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        connect(&mut app, &mut out);
        let history = (0..20)
            .map(|i| message("Medical", "Triage", &format!("note {}", i)))
            .collect();
        app.handle_transport(TransportEvent::PreviousMessages(history), &mut out);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();

        app.active_pane = Pane::Messages;
        press(&mut app, KeyCode::Home, &mut out);
        let top = app.messages.scroll_back;
        // 20 bubbles of 5 lines, minus what fits on screen.
        assert!(top > PAGE_LINES && top < 100, "top = {}", top);
        press(&mut app, KeyCode::PageDown, &mut out);
        assert_eq!(app.messages.scroll_back, top - PAGE_LINES);
        press(&mut app, KeyCode::Home, &mut out);
        press(&mut app, KeyCode::Up, &mut out);
        assert_eq!(app.messages.scroll_back, top);
    }

    #[test]
    fn test_help_and_debug_toggles() {
        let mut app = app();
        let mut out: Vec<OutboundEvent> = Vec::new();
        press(&mut app, KeyCode::F(12), &mut out);
        assert!(app.debug_log.visible);

        app.active_pane = Pane::Rooms;
        press(&mut app, KeyCode::Char('?'), &mut out);
        assert!(app.show_help);
        // Any key closes help without acting.
        press(&mut app, KeyCode::Char('q'), &mut out);
        assert!(!app.show_help);
        assert!(!app.should_exit);
    }
}
