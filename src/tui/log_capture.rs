//! In-memory log sink for TUI mode.
//!
//! While the alternate screen is active, anything written to stderr would
//! tear the layout. The fmt layer writes into a `LogBuffer` instead and the
//! debug pane drains it.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Lines kept while nobody drains the buffer.
const CAPACITY: usize = 500;

/// Shared bounded queue of complete log lines. Oldest lines fall off.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    /// Lines pushed out before anyone drained them.
    dropped: Arc<AtomicUsize>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        // A poisoned lock only means a writer panicked mid-push; the queue
        // itself is still usable.
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        while lines.len() >= CAPACITY {
            lines.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        lines.push_back(line);
    }

    /// How many lines were lost to the capacity limit so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Take every buffered line, oldest first.
    pub fn drain(&self) -> Vec<String> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.drain(..).collect()
    }
}

/// Per-event writer handed out by `MakeWriter`. Splits output on newlines.
pub struct LineWriter {
    sink: LogBuffer,
    partial: Vec<u8>,
}

impl LineWriter {
    fn emit_complete_lines(&mut self) {
        while let Some(end) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=end).collect();
            self.sink
                .push(String::from_utf8_lossy(&line[..end]).into_owned());
        }
    }
}

impl Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.partial.extend_from_slice(buf);
        self.emit_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.sink.push(String::from_utf8_lossy(&rest).into_owned());
        }
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            sink: self.clone(),
            partial: Vec::new(),
        }
    }
}
