//! Debug log pane (F12): captured tracing output.
//!
//! Socket.IO frames logged by the websocket layer are shortened to their
//! direction and event, so a join or a history batch reads at a glance.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use serde_json::Value;

use super::log_capture::LogBuffer;
use crate::socketio::packet::{EnginePacket, PacketKind};

/// Scrollback kept by the pane.
const HISTORY_LIMIT: usize = 1000;

/// Height of the pane when shown.
pub const DEBUG_LOG_HEIGHT: u16 = 10;

/// Frame log markers, the arrow that replaces them and their color.
const FRAME_MARKERS: [(&str, &str, Color); 2] = [
    ("WS send: ", "->", Color::Cyan),
    ("WS recv: ", "<-", Color::Magenta),
];

pub struct DebugLogState {
    source: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
    /// Lines scrolled back from the newest (0 = tail).
    offset: usize,
}

impl DebugLogState {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            lines: Vec::new(),
            visible: false,
            offset: 0,
        }
    }

    /// Pull new lines from the capture buffer. Call once per frame.
    pub fn refresh(&mut self) {
        self.lines.extend(self.source.drain());
        if self.lines.len() > HISTORY_LIMIT {
            let excess = self.lines.len() - HISTORY_LIMIT;
            self.lines.drain(..excess);
            self.offset = self.offset.min(self.lines.len().saturating_sub(1));
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        self.offset = 0;
    }

    pub fn scroll_back(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.lines.len().saturating_sub(1));
    }

    pub fn scroll_forward(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lines.len()
    }
}

pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let title = match state.source.dropped() {
        0 => " Debug Log ".to_string(),
        n => format!(" Debug Log ({} lines lost) ", n),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let end = state.lines.len().saturating_sub(state.offset);
    let start = end.saturating_sub(inner.height as usize);
    let lines: Vec<Line> = state.lines[start..end]
        .iter()
        .map(|l| styled_line(l))
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

fn styled_line(line: &str) -> Line<'static> {
    let (text, color) =
        frame_summary(line).unwrap_or_else(|| (line.to_string(), level_color(line)));
    Line::from(Span::styled(text, Style::default().fg(color)))
}

/// Color of a fmt-layer line by its level field.
fn level_color(line: &str) -> Color {
    [
        ("ERROR", Color::Red),
        ("WARN", Color::Yellow),
        ("INFO", Color::Green),
        ("DEBUG", Color::DarkGray),
        ("TRACE", Color::DarkGray),
    ]
    .iter()
    .find(|(level, _)| line.split_whitespace().take(2).any(|w| w == *level))
    .map(|(_, c)| *c)
    .unwrap_or(Color::Gray)
}

/// Rewrite a logged websocket frame as `-> event` or `<- event`.
fn frame_summary(line: &str) -> Option<(String, Color)> {
    FRAME_MARKERS.iter().find_map(|(marker, arrow, color)| {
        let at = line.find(marker)?;
        let frame = &line[at + marker.len()..];
        Some((format!("{}{} {}", &line[..at], arrow, describe_frame(frame)), *color))
    })
}

fn describe_frame(frame: &str) -> String {
    let packet = match EnginePacket::decode(frame) {
        Ok(EnginePacket::Message(packet)) => packet,
        Ok(EnginePacket::Open(open)) => return format!("open sid={}", open.sid),
        Ok(EnginePacket::Ping(_)) => return "ping".to_string(),
        Ok(EnginePacket::Pong(_)) => return "pong".to_string(),
        Ok(EnginePacket::Close) => return "close".to_string(),
        _ => return frame.to_string(),
    };
    match packet.kind {
        PacketKind::Connect => format!("connect {}", packet.namespace),
        PacketKind::Disconnect => format!("disconnect {}", packet.namespace),
        PacketKind::ConnectError => {
            format!("rejected {}: {}", packet.namespace, packet.error_message())
        }
        _ => match packet.event_parts() {
            // History batches are long; the count is what matters here.
            Some((name, Value::Array(items))) => format!("{} ({} messages)", name, items.len()),
            Some((name, payload)) => format!("{} {}", name, payload),
            None => frame.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_moves_lines_and_caps_history() {
        let source = LogBuffer::new();
        let mut state = DebugLogState::new(source.clone());
        for i in 0..300 {
            source.push(format!("line {}", i));
        }
        state.refresh();
        assert_eq!(state.len(), 300);
        for _ in 0..4 {
            for i in 0..300 {
                source.push(format!("more {}", i));
            }
            state.refresh();
        }
        assert_eq!(state.len(), HISTORY_LIMIT);
    }

    #[test]
    fn test_scroll_clamps() {
        let source = LogBuffer::new();
        let mut state = DebugLogState::new(source.clone());
        for i in 0..5 {
            source.push(format!("{}", i));
        }
        state.refresh();
        state.scroll_back(100);
        assert_eq!(state.offset, 4);
        state.scroll_forward(100);
        assert_eq!(state.offset, 0);
    }

    #[test]
    fn test_level_color() {
        let line = styled_line("2024-10-27T09:00:00Z  WARN Chat session lost");
        assert_eq!(line.spans[0].style.fg, Some(Color::Yellow));
        let line = styled_line("2024-10-27T09:00:00Z ERROR boom");
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
        let line = styled_line("no level here");
        assert_eq!(line.spans[0].style.fg, Some(Color::Gray));
    }

    #[test]
    fn test_frames_are_summarized() {
        let line = styled_line(
            r#"2024-10-27T09:00:00Z DEBUG WS recv: 42/chat,["previous_messages",[{"content":"a"},{"content":"b"}]]"#,
        );
        assert_eq!(
            line.spans[0].content,
            "2024-10-27T09:00:00Z DEBUG <- previous_messages (2 messages)"
        );
        assert_eq!(line.spans[0].style.fg, Some(Color::Magenta));

        let line = styled_line(r#"DEBUG WS send: 42/chat,["join",{"room":"Triage"}]"#);
        assert_eq!(line.spans[0].content, r#"DEBUG -> join {"room":"Triage"}"#);
        assert_eq!(line.spans[0].style.fg, Some(Color::Cyan));

        assert_eq!(styled_line("DEBUG WS send: 3").spans[0].content, "DEBUG -> pong");
        assert_eq!(styled_line("DEBUG WS send: 40/chat,").spans[0].content, "DEBUG -> connect /chat");
        assert_eq!(
            styled_line(r#"DEBUG WS recv: 44/chat,{"message":"denied"}"#).spans[0].content,
            "DEBUG <- rejected /chat: denied"
        );
        assert_eq!(styled_line("DEBUG WS recv: garbage").spans[0].content, "DEBUG <- garbage");
    }

    #[test]
    fn test_title_counts_lost_lines() {
        let source = LogBuffer::new();
        let state = DebugLogState::new(source.clone());
        for i in 0..520 {
            source.push(format!("{}", i));
        }
        let area = Rect::new(0, 0, 60, DEBUG_LOG_HEIGHT);
        let mut buf = Buffer::empty(area);
        render(area, &mut buf, &state);
        let top: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(top.contains("Debug Log (20 lines lost)"), "{}", top);
    }
}
