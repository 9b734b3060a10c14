//! Help popup: keyboard shortcuts by category.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 72;
const POPUP_HEIGHT: u16 = 20;

/// Key binding and what it does.
type Shortcut = (&'static str, &'static str);

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const GENERAL: Category = Category {
    title: "GENERAL",
    shortcuts: &[
        ("Tab", "Next pane"),
        ("Shift+Tab", "Previous pane"),
        ("F12", "Toggle debug log"),
        ("Shift+PgUp/Dn", "Scroll debug log"),
        ("?", "Toggle this help"),
        ("q", "Quit (outside compose)"),
        ("Ctrl+C", "Quit"),
    ],
};

const ROOMS: Category = Category {
    title: "ROOMS",
    shortcuts: &[("Up/Down", "Select room"), ("Enter", "Switch to room")],
};

const MESSAGES: Category = Category {
    title: "MESSAGES",
    shortcuts: &[
        ("Up/Down", "Scroll one line"),
        ("PgUp/PgDn", "Scroll one page"),
        ("Home", "Oldest message"),
        ("End", "Latest message"),
    ],
};

const COMPOSE: Category = Category {
    title: "COMPOSE",
    shortcuts: &[
        ("Enter", "Send message"),
        ("Left/Right", "Move cursor"),
        ("Home/End", "Line start / end"),
        ("Ctrl+U", "Clear input"),
        ("Esc", "Back to messages"),
    ],
};

pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup_area = centered_rect(
        POPUP_WIDTH.min(area.width.saturating_sub(2)),
        POPUP_HEIGHT.min(area.height.saturating_sub(2)),
        area,
    );
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " HELP ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("(? to close) ", Style::default().fg(Color::Gray)),
        ]))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [left, right] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);
    frame.render_widget(
        Paragraph::new(column_lines(&[&GENERAL, &ROOMS])),
        inset(left, 1, 1),
    );
    frame.render_widget(
        Paragraph::new(column_lines(&[&MESSAGES, &COMPOSE])),
        inset(right, 1, 1),
    );
}

fn column_lines(categories: &[&Category]) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, cat) in categories.iter().enumerate() {
        if i > 0 {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "\u{2500}".repeat(30),
            Style::default().fg(Color::DarkGray),
        )));
        for (key, desc) in cat.shortcuts {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<15}", key), Style::default().fg(Color::Yellow)),
                Span::styled(*desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }
    lines
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}
