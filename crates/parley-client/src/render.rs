//! Presentation seam.
//!
//! The session controller never formats anything itself. It hands roster
//! snapshots, messages and notices to a [`RenderingSink`] supplied by the host.

use parking_lot::Mutex;
use parley_core::{ChatMessage, Identity, RosterEntry, UserId};

/// A roster entry prepared for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterView {
    /// Hub-assigned id.
    pub id: UserId,
    /// Name as sent by the hub.
    pub display_name: String,
    /// Whether this entry is the local user.
    pub is_self: bool,
}

impl RosterView {
    /// Build the display list for `entries`, flagging the one owned by `me`.
    pub fn from_entries(entries: &[RosterEntry], me: Option<&Identity>) -> Vec<Self> {
        entries
            .iter()
            .map(|entry| Self {
                id: entry.id.clone(),
                display_name: entry.display_name.clone(),
                is_self: me.is_some_and(|me| me.owns(&entry.id)),
            })
            .collect()
    }
}

/// Local notifications that do not come from the hub.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// A send was attempted without an open connection.
    NotConnected,
    /// The hub closed the connection.
    ConnectionClosed,
    /// The transport reported an error.
    TransportError(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => f.write_str("not connected"),
            Self::ConnectionClosed => f.write_str("disconnected from chat"),
            Self::TransportError(message) => write!(f, "connection error: {message}"),
        }
    }
}

/// Host-supplied presentation surface.
pub trait RenderingSink: Send + Sync {
    /// Replace the displayed roster.
    fn render_roster(&self, entries: &[RosterView]);

    /// Append a message. `is_own` is set for messages sent by the local user.
    fn render_message(&self, message: &ChatMessage, is_own: bool);

    /// Show why registration failed.
    fn show_registration_error(&self, message: &str);

    /// Show a local notice.
    fn show_notice(&self, _notice: &Notice) {}
}

/// Everything a [`RecordingSink`] received, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered {
    /// `render_roster` call.
    Roster(Vec<RosterView>),
    /// `render_message` call.
    Message {
        /// The message.
        message: ChatMessage,
        /// Own-message flag.
        is_own: bool,
    },
    /// `show_registration_error` call.
    RegistrationError(String),
    /// `show_notice` call.
    Notice(Notice),
}

/// Sink that records every call. Useful for headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<Rendered>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<Rendered> {
        self.calls.lock().clone()
    }

    /// The most recent roster, if any was rendered.
    pub fn last_roster(&self) -> Option<Vec<RosterView>> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            Rendered::Roster(entries) => Some(entries.clone()),
            _ => None,
        })
    }

    /// Rendered messages with their own-message flag.
    pub fn messages(&self) -> Vec<(ChatMessage, bool)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Rendered::Message { message, is_own } => Some((message.clone(), *is_own)),
                _ => None,
            })
            .collect()
    }

    /// Registration errors shown so far.
    pub fn registration_errors(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Rendered::RegistrationError(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Notices shown so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Rendered::Notice(notice) => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Rendered) {
        self.calls.lock().push(call);
    }
}

impl RenderingSink for RecordingSink {
    fn render_roster(&self, entries: &[RosterView]) {
        self.push(Rendered::Roster(entries.to_vec()));
    }

    fn render_message(&self, message: &ChatMessage, is_own: bool) {
        self.push(Rendered::Message {
            message: message.clone(),
            is_own,
        });
    }

    fn show_registration_error(&self, message: &str) {
        self.push(Rendered::RegistrationError(message.to_string()));
    }

    fn show_notice(&self, notice: &Notice) {
        self.push(Rendered::Notice(notice.clone()));
    }
}
