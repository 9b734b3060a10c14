//! Messages pane: chat bubbles, own messages on the right.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use std::cell::Cell;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::chat::render::{Alignment, RenderedMessage};
use crate::chat::view::MessageView;

/// Tabs are drawn as this many spaces.
const TAB: &str = "    ";

/// Scroll position of the messages pane.
#[derive(Default)]
pub struct MessagesState {
    /// Lines scrolled back from the newest message (0 = following the tail).
    pub scroll_back: usize,
    /// Largest useful `scroll_back` at the last draw. Unknown before it.
    max_scroll: Cell<Option<usize>>,
}

impl MessagesState {
    /// Jump to the newest message.
    pub fn follow_latest(&mut self) {
        self.scroll_back = 0;
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll_back = self.scroll_back.saturating_add(n).min(self.limit());
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_back = self.scroll_back.min(self.limit()).saturating_sub(n);
    }

    /// Jump to the oldest message.
    pub fn scroll_to_top(&mut self) {
        self.scroll_back = self.limit();
    }

    fn limit(&self) -> usize {
        self.max_scroll.get().unwrap_or(usize::MAX)
    }

    /// Record how far back the last draw could scroll.
    fn set_max_scroll(&self, max: usize) {
        self.max_scroll.set(Some(max));
    }
}

pub fn render(
    area: Rect,
    buf: &mut Buffer,
    view: &MessageView,
    state: &MessagesState,
    room: &str,
    focused: bool,
) {
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
    block.render(area, buf);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    // Room header on the first row.
    Paragraph::new(Line::from(Span::styled(
        format!(" #{} ", room),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )))
    .style(Style::default().bg(Color::DarkGray))
    .render(Rect::new(inner.x, inner.y, inner.width, 1), buf);

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );
    if body.height == 0 {
        return;
    }

    if view.is_empty() {
        state.set_max_scroll(0);
        Paragraph::new(Line::from(Span::styled(
            " No messages yet",
            Style::default().fg(Color::DarkGray),
        )))
        .render(body, buf);
        return;
    }

    let lines = bubble_lines(view.items(), body.width as usize);
    let height = body.height as usize;
    state.set_max_scroll(lines.len().saturating_sub(height));
    let (start, end) = visible_range(lines.len(), height, state.scroll_back);

    for (row, line) in lines[start..end].iter().enumerate() {
        let y = body.y + row as u16;
        Paragraph::new(line.clone()).render(Rect::new(body.x, y, body.width, 1), buf);
    }

    // More history above.
    if start > 0 {
        let x = body.x + body.width.saturating_sub(1);
        buf[(x, body.y)]
            .set_char('^')
            .set_style(Style::default().fg(Color::DarkGray));
    }
    // Scrolled away from the tail.
    if end < lines.len() {
        let x = body.x + body.width.saturating_sub(1);
        let y = body.y + body.height - 1;
        buf[(x, y)]
            .set_char('v')
            .set_style(Style::default().fg(Color::DarkGray));
    }
}

/// Window `[start, end)` of `total` lines shown in `height` rows when
/// scrolled `scroll_back` lines up from the bottom.
fn visible_range(total: usize, height: usize, scroll_back: usize) -> (usize, usize) {
    let max_back = total.saturating_sub(height);
    let back = scroll_back.min(max_back);
    let end = total - back;
    (end.saturating_sub(height), end)
}

/// Lay out every message as a bordered bubble, one blank line apart.
fn bubble_lines(items: &[RenderedMessage], width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for item in items {
        push_bubble(&mut lines, item, width);
        lines.push(Line::from(""));
    }
    lines
}

fn push_bubble(lines: &mut Vec<Line<'static>>, item: &RenderedMessage, width: usize) {
    // Bubbles take at most three quarters of the pane.
    let max_inner = (width * 3 / 4).saturating_sub(4).max(8);
    let header_w = header_width(item);
    let body = wrap_text(&item.body, max_inner);
    let content_w = body
        .iter()
        .map(|l| l.width())
        .chain(std::iter::once(header_w))
        .max()
        .unwrap_or(0)
        .min(max_inner);
    let bubble_w = content_w + 4;
    let indent = match item.alignment {
        Alignment::Own => " ".repeat(width.saturating_sub(bubble_w)),
        Alignment::Other => String::new(),
    };
    let border = match item.alignment {
        Alignment::Own => Style::default().fg(Color::Cyan),
        Alignment::Other => Style::default().fg(Color::Gray),
    };
    let edge = format!("+{}+", "-".repeat(content_w + 2));

    lines.push(Line::from(vec![
        Span::raw(indent.clone()),
        Span::styled(edge.clone(), border),
    ]));

    let mut header = vec![
        Span::raw(indent.clone()),
        Span::styled("| ".to_string(), border),
    ];
    header.extend(header_spans(item, content_w));
    header.push(Span::styled(" |".to_string(), border));
    lines.push(Line::from(header));

    for text in body {
        let pad = content_w.saturating_sub(text.width());
        lines.push(Line::from(vec![
            Span::raw(indent.clone()),
            Span::styled("| ".to_string(), border),
            Span::raw(format!("{}{}", text, " ".repeat(pad))),
            Span::styled(" |".to_string(), border),
        ]));
    }

    lines.push(Line::from(vec![
        Span::raw(indent),
        Span::styled(edge, border),
    ]));
}

fn header_width(item: &RenderedMessage) -> usize {
    item.header().width()
}

/// `assignment (username)  @  HH:MM`, styled, padded or cut to `width`.
fn header_spans(item: &RenderedMessage, width: usize) -> Vec<Span<'static>> {
    let parts = [
        (
            item.assignment.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        (format!(" ({})", item.username), Style::default().fg(Color::Gray)),
        (
            format!("  @  {}", item.time_label),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    let mut spans = Vec::new();
    let mut used = 0;
    for (text, style) in parts {
        let room_left = width - used;
        let cut = truncate_to_width(&text, room_left);
        used += cut.width();
        spans.push(Span::styled(cut, style));
        if used >= width {
            break;
        }
    }
    if used < width {
        spans.push(Span::raw(" ".repeat(width - used)));
    }
    spans
}

fn truncate_to_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Word-wrap `text` to `max_width` columns.
///
/// Explicit newlines and runs of spaces are kept and tabs become spaces.
/// Whitespace where a line breaks is dropped. Words longer than a line are
/// split.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return Vec::new();
    }
    let mut result = Vec::new();
    for raw_line in text.split('\n') {
        let raw_line = raw_line.strip_suffix('\r').unwrap_or(raw_line).replace('\t', TAB);
        let mut current = String::new();
        for run in split_runs(&raw_line) {
            if current.width() + run.width() <= max_width {
                current.push_str(run);
                continue;
            }
            let done = current.trim_end();
            if !done.is_empty() {
                result.push(done.to_string());
            }
            current.clear();
            if run.starts_with(char::is_whitespace) {
                continue;
            }
            let mut word = run;
            while word.width() > max_width {
                let head = truncate_to_width(word, max_width);
                // A single glyph wider than the line still has to go somewhere.
                let cut = match head.len() {
                    0 => word.chars().next().map_or(word.len(), char::len_utf8),
                    n => n,
                };
                if cut == word.len() {
                    break;
                }
                result.push(word[..cut].to_string());
                word = &word[cut..];
            }
            current.push_str(word);
        }
        result.push(current);
    }
    result
}

/// Split a line into alternating runs of whitespace and other characters.
fn split_runs(line: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_blank = None;
    for (i, c) in line.char_indices() {
        let blank = c.is_whitespace();
        if matches!(prev_blank, Some(prev) if prev != blank) {
            runs.push(&line[start..i]);
            start = i;
        }
        prev_blank = Some(blank);
    }
    if start < line.len() {
        runs.push(&line[start..]);
    }
    runs
}
