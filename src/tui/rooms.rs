//! Rooms pane: pick the room to chat in.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

/// Width of the rooms pane in columns.
pub const ROOMS_WIDTH: u16 = 20;

pub struct RoomsState {
    pub rooms: Vec<String>,
    /// Highlighted row (not necessarily the joined room).
    pub selected: usize,
}

impl RoomsState {
    /// Build the list, making sure the joined room is in it and highlighted.
    pub fn new(mut rooms: Vec<String>, current: &str) -> Self {
        rooms.retain(|r| !r.is_empty());
        if !rooms.iter().any(|r| r == current) {
            rooms.push(current.to_string());
        }
        let selected = rooms.iter().position(|r| r == current).unwrap_or(0);
        Self { rooms, selected }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.rooms.len() {
            self.selected += 1;
        }
    }

    pub fn selected_room(&self) -> Option<&str> {
        self.rooms.get(self.selected).map(String::as_str)
    }
}

pub fn render(area: Rect, buf: &mut Buffer, state: &RoomsState, current: &str, focused: bool) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(
            " ROOMS ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let lines: Vec<Line> = state
        .rooms
        .iter()
        .enumerate()
        .take(inner.height as usize)
        .map(|(i, room)| room_line(room, room == current, i == state.selected && focused))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

fn room_line(room: &str, joined: bool, highlighted: bool) -> Line<'static> {
    let marker = if joined { "*" } else { " " };
    let mut style = if joined {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    if highlighted {
        style = style.bg(Color::DarkGray);
    }
    Line::from(Span::styled(format!("{} #{}", marker, room), style))
}
