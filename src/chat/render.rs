//! Message rendering: alignment and bubble text.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone};

use crate::models::ChatMessage;

/// Which side of the view a bubble sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Sent under our own assignment (drawn on the right).
    Own,
    Other,
}

impl Alignment {
    /// Own iff the message was sent under the given assignment.
    pub fn of(message: &ChatMessage, own_assignment: &str) -> Self {
        if message.assignment == own_assignment {
            Alignment::Own
        } else {
            Alignment::Other
        }
    }
}

/// One rendered bubble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub alignment: Alignment,
    pub assignment: String,
    pub username: String,
    /// `HH:MM` in local time, or empty when the timestamp is unusable.
    pub time_label: String,
    pub body: String,
}

impl RenderedMessage {
    /// Bubble header: `assignment (username)  @  HH:MM`.
    pub fn header(&self) -> String {
        format!(
            "{} ({})  @  {}",
            self.assignment, self.username, self.time_label
        )
    }
}

/// Render a message for a client chatting as `own_assignment`.
pub fn render(message: &ChatMessage, own_assignment: &str) -> RenderedMessage {
    render_in(message, own_assignment, &Local)
}

/// Render with times shown in an explicit zone.
pub fn render_in<Tz: TimeZone>(
    message: &ChatMessage,
    own_assignment: &str,
    tz: &Tz,
) -> RenderedMessage
where
    Tz::Offset: std::fmt::Display,
{
    RenderedMessage {
        alignment: Alignment::of(message, own_assignment),
        assignment: message.assignment.clone(),
        username: message.username.clone(),
        time_label: format_time_in(&message.created_at, tz),
        body: message.content.clone(),
    }
}

/// Naive layouts the server is known to produce (SQLite `CURRENT_TIMESTAMP`,
/// Python `isoformat()`, browser `Date` strings without a zone).
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Format a raw timestamp as zero-padded `HH:MM` in `tz`.
///
/// Zoned timestamps are converted; naive ones are taken as already being in
/// `tz`; all-digit strings are epoch milliseconds. Anything else yields "".
pub fn format_time_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(tz).format("%H:%M").to_string();
    }

    if raw.chars().all(|c| c.is_ascii_digit()) {
        return match raw.parse::<i64>().ok().map(|ms| tz.timestamp_millis_opt(ms)) {
            Some(LocalResult::Single(dt)) => dt.format("%H:%M").to_string(),
            _ => String::new(),
        };
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return naive.format("%H:%M").to_string();
        }
    }

    tracing::debug!("Unparseable timestamp: {:?}", raw);
    String::new()
}
