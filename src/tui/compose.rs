//! Compose box: single-line message input.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

/// Border + input line + border.
pub const COMPOSE_HEIGHT: u16 = 3;

/// Text being composed and the cursor inside it.
#[derive(Default)]
pub struct ComposeState {
    pub input: String,
    /// Cursor position in characters.
    pub cursor: usize,
}

impl ComposeState {
    fn byte_index(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn char_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.input.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.input.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_index(self.cursor);
            self.input.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    /// Keep the cursor inside the text after the input was changed
    /// from outside (e.g. taken by a submit).
    pub fn sync_cursor(&mut self) {
        self.cursor = self.cursor.min(self.char_len());
    }
}

pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, room: &str, focused: bool) {
    let (border_style, border_type) = if focused {
        (Style::default().fg(Color::Yellow), BorderType::Double)
    } else {
        (Style::default().fg(Color::DarkGray), BorderType::Plain)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }
    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);

    if state.input.is_empty() {
        let placeholder = Line::from(Span::styled(
            format!(" Message {}...", room),
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(placeholder), input_area);
        if focused {
            frame.set_cursor_position((input_area.x + 1, input_area.y));
        }
        return;
    }

    let window = visible_window(&state.input, state.cursor, inner.width.saturating_sub(1) as usize);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            format!(" {}", window.text),
            Style::default().fg(Color::White),
        ))),
        input_area,
    );
    if focused {
        frame.set_cursor_position((input_area.x + 1 + window.cursor_col as u16, input_area.y));
    }
}

/// Slice of the input that fits on screen, keeping the cursor visible.
#[derive(Debug, PartialEq)]
struct Window {
    text: String,
    cursor_col: usize,
}

/// Scroll horizontally so the cursor stays within `width` columns.
/// Newlines are shown as `↵`.
fn visible_window(input: &str, cursor: usize, width: usize) -> Window {
    if width == 0 {
        return Window {
            text: String::new(),
            cursor_col: 0,
        };
    }
    let chars: Vec<char> = input
        .chars()
        .map(|c| if c == '\n' { '↵' } else { c })
        .collect();
    let col = |c: &char| c.width().unwrap_or(0);
    let cursor = cursor.min(chars.len());

    // Walk back from the cursor, leaving one column for the cursor itself.
    let mut start = cursor;
    let mut used = 0;
    while start > 0 && used + col(&chars[start - 1]) < width {
        used += col(&chars[start - 1]);
        start -= 1;
    }

    let mut text = String::new();
    let mut total = 0;
    for c in &chars[start..] {
        let w = col(c);
        if total + w > width {
            break;
        }
        total += w;
        text.push(*c);
    }
    Window {
        text,
        cursor_col: used,
    }
}
