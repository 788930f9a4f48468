//! Terminal rendering of roster snapshots, messages and notices.

use std::io::Write;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use parley_client::{Notice, RenderingSink, RosterView};
use parley_core::ChatMessage;
use tracing::warn;

/// Label shown in place of the local user's name.
pub const SELF_LABEL: &str = "You";

const TIMESTAMP_FORMAT: &str = "%H:%M %d.%m.%Y";

/// Line-oriented sink writing to any [`Write`] target.
pub struct ConsoleSink<W> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    /// Sink printing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Wrap `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, line: &str) {
        let mut out = self.out.lock();
        if let Err(error) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(%error, "console write failed");
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

/// One-line roster summary, own entry shown as [`SELF_LABEL`].
pub fn roster_line(entries: &[RosterView]) -> String {
    let names: Vec<&str> = entries
        .iter()
        .map(|entry| {
            if entry.is_self {
                SELF_LABEL
            } else {
                entry.display_name.as_str()
            }
        })
        .collect();
    format!("online ({}): {}", entries.len(), names.join(", "))
}

/// Sender label and receipt time, e.g. `bob, 09:07 05.03.2024`.
pub fn message_header(message: &ChatMessage, is_own: bool) -> String {
    let sender = if is_own {
        SELF_LABEL
    } else {
        message.sender_display_name.as_str()
    };
    format!("{sender}, {}", format_timestamp(&message.observed_at))
}

fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

impl<W: Write + Send> RenderingSink for ConsoleSink<W> {
    fn render_roster(&self, entries: &[RosterView]) {
        self.emit(&roster_line(entries));
    }

    fn render_message(&self, message: &ChatMessage, is_own: bool) {
        self.emit(&format!(
            "[{}] {}",
            message_header(message, is_own),
            message.body
        ));
    }

    fn show_registration_error(&self, message: &str) {
        self.emit(&format!("registration failed: {message}"));
    }

    fn show_notice(&self, notice: &Notice) {
        self.emit(&format!("* {notice}"));
    }
}
