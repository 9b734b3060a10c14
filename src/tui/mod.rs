//! Terminal user interface using Ratatui.

mod app;
mod compose;
mod debug_log;
mod help;
mod log_capture;
mod messages;
mod rooms;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;
