//! Screen layout for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, ConnectionState, Pane};
use super::compose;
use super::debug_log;
use super::help;
use super::messages;
use super::rooms;

const TITLE: &str = " MedTrack Chat";

/// Status symbol and color for the connection state
fn status_indicator(state: &ConnectionState) -> (&'static str, Color) {
    match state {
        ConnectionState::Online => ("*", Color::Green),
        ConnectionState::Connecting => ("~", Color::Yellow),
        ConnectionState::Offline(_) => ("o", Color::Red),
    }
}

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let debug_height = if app.debug_log.visible {
        debug_log::DEBUG_LOG_HEIGHT
    } else {
        0
    };
    let [header_area, main_area, debug_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(debug_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [rooms_area, content_area] = Layout::horizontal([
        Constraint::Length(rooms::ROOMS_WIDTH),
        Constraint::Fill(1),
    ])
    .areas(main_area);

    let current_room = app.client.current_room();
    rooms::render(
        rooms_area,
        frame.buffer_mut(),
        &app.rooms,
        current_room,
        app.active_pane == Pane::Rooms,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        app.client.view(),
        &app.messages,
        current_room,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        current_room,
        app.active_pane == Pane::Compose,
    );

    if app.debug_log.visible {
        debug_log::render(debug_area, frame.buffer_mut(), &app.debug_log);
    }

    render_status(status_area, frame.buffer_mut(), app);

    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let identity = app.client.identity();
    let (symbol, color) = status_indicator(&app.connection);
    let state = match app.connection {
        ConnectionState::Online => "online",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Offline(_) => "offline",
    };
    let online = format!(" {} {} ", symbol, state);
    let user = format!(" {} ({}) ", identity.assignment, identity.username);
    let help = " [?] Help ";

    let right_width = help.width() + online.width() + user.width();
    let padding = (area.width as usize).saturating_sub(TITLE.width() + right_width);

    let line = Line::from(vec![
        Span::styled(
            TITLE,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(help, Style::default().fg(Color::Gray)),
        Span::styled(online, Style::default().fg(color)),
        Span::styled(user, Style::default().fg(Color::Cyan)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (symbol, color) = status_indicator(&app.connection);
    let sep = Span::styled(" | ", Style::default().fg(Color::DarkGray));
    let line = Line::from(vec![
        Span::styled(
            format!(" {} {} ", symbol, app.connection.label()),
            Style::default().fg(color),
        ),
        sep.clone(),
        Span::styled(
            format!("#{}", app.client.current_room()),
            Style::default().fg(Color::Yellow),
        ),
        sep.clone(),
        Span::styled(
            format!("{} messages", app.client.view().len()),
            Style::default().fg(Color::Gray),
        ),
        sep.clone(),
        Span::styled(
            format!("Tab: {}", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        sep,
        Span::styled("?: help  F12: log", Style::default().fg(Color::Gray)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::client_in;
    use crate::tui::debug_log::DebugLogState;
    use crate::tui::log_capture::LogBuffer;
    use crate::tui::rooms::RoomsState;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut text = String::new();
        for y in 0..height {
            for x in 0..width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn app() -> App {
        let client = client_in(Some("Triage"), "Medical");
        let rooms = RoomsState::new(vec!["Medical".into(), "Triage".into()], "Triage");
        App::new(client, rooms, DebugLogState::new(LogBuffer::new()))
    }

    #[test]
    fn test_layout_shows_identity_rooms_and_state() {
        let text = screen_text(&app(), 100, 20);
        assert!(text.contains("MedTrack Chat"));
        assert!(text.contains("Medical (Casey)"));
        assert!(text.contains("* #Triage"));
        assert!(text.contains("connecting"));
        assert!(text.contains("No messages yet"));
    }

    #[test]
    fn test_status_message_replaces_status_bar() {
        let mut app = app();
        app.status_message = Some("Offline: message queued".into());
        app.status_is_error = true;
        let text = screen_text(&app, 100, 20);
        assert!(text.contains("Offline: message queued"));
        assert!(!text.contains("Tab: compose"));
    }

    #[test]
    fn test_tiny_terminal_does_not_panic() {
        let mut app = app();
        app.debug_log.toggle();
        app.show_help = true;
        screen_text(&app, 10, 4);
    }
}
