//! Session domain model.
//!
//! Both [`Identity`] and [`RosterEntry`] use the hub's `{ "id", "name" }`
//! object shape on the wire; the display name is exposed as `display_name`
//! on the Rust side.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// The registered user's id and display name.
///
/// Created once by a successful registration and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Hub-assigned id.
    pub id: UserId,
    /// Name claimed at registration.
    #[serde(rename = "name")]
    pub display_name: String,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// Whether `id` refers to this identity.
    #[must_use]
    pub fn owns(&self, id: &UserId) -> bool {
        &self.id == id
    }
}

/// One participant in a roster snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Hub-assigned id.
    pub id: UserId,
    /// Name shown for this participant.
    #[serde(rename = "name")]
    pub display_name: String,
}

impl RosterEntry {
    /// Create a roster entry.
    #[must_use]
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A chat message as observed by this client.
///
/// The hub does not transmit a timestamp. `observed_at` is the local receipt
/// time, so display order is receipt order rather than authored order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Sender id.
    pub sender_id: UserId,
    /// Sender name as carried by the frame.
    pub sender_display_name: String,
    /// Message text, unmodified.
    pub body: String,
    /// Local receipt time.
    pub observed_at: DateTime<Local>,
}

impl ChatMessage {
    /// Stamp a message received from `sender` with the current local time.
    #[must_use]
    pub fn observed_now(sender: RosterEntry, body: String) -> Self {
        Self::observed_at(sender, body, Local::now())
    }

    /// Build a message with an explicit receipt time.
    #[must_use]
    pub fn observed_at(sender: RosterEntry, body: String, observed_at: DateTime<Local>) -> Self {
        Self {
            sender_id: sender.id,
            sender_display_name: sender.display_name,
            body,
            observed_at,
        }
    }
}
