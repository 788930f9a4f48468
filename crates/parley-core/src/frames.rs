//! Wire formats: registration exchange and persistent-connection frames.
//!
//! Outbound frames are a `type`-tagged enum. Inbound frames are decoded from an
//! already-parsed JSON value by [`InboundFrame::decode`], which recognizes two
//! roster shapes:
//!
//! - `{ "type": "users", "users": [...] }` (preferred)
//! - a bare `[...]` of entries (legacy hubs)
//!
//! and one message shape, `{ "type": "send", "message": ..., "user": {...} }`.
//! Anything else is reported as [`FrameError::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;
use crate::model::{Identity, RosterEntry};

/// `type` value of roster frames.
pub const ROSTER_MARKER: &str = "users";
/// `type` value of chat-message frames.
pub const MESSAGE_MARKER: &str = "send";
/// `type` value of exit frames.
pub const EXIT_MARKER: &str = "exit";

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Body of the name-claim request.
#[derive(Clone, Debug, Serialize)]
pub struct RegistrationRequest<'a> {
    /// Requested display name.
    pub name: &'a str,
}

/// Body of the name-claim response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RegistrationResponse {
    /// The name was accepted.
    Ok {
        /// Identity assigned by the hub.
        user: Identity,
    },
    /// The name was refused.
    Error {
        /// Optional reason.
        #[serde(default)]
        message: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// A domain command sent to the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Post a chat message.
    Send {
        /// Message text.
        message: String,
        /// Author.
        user: Identity,
    },
    /// Announce departure.
    Exit {
        /// Departing user.
        user: Identity,
    },
}

impl OutboundFrame {
    /// Chat message from `sender`.
    #[must_use]
    pub fn send_message(sender: &Identity, body: impl Into<String>) -> Self {
        Self::Send {
            message: body.into(),
            user: sender.clone(),
        }
    }

    /// Exit announcement for `sender`.
    #[must_use]
    pub fn exit(sender: &Identity) -> Self {
        Self::Exit {
            user: sender.clone(),
        }
    }

    /// Wire `type` marker.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Send { .. } => MESSAGE_MARKER,
            Self::Exit { .. } => EXIT_MARKER,
        }
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Which roster shape a frame arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterShape {
    /// `{ "type": "users", "users": [...] }`.
    Tagged,
    /// Bare array.
    Legacy,
}

/// A classified inbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Full roster snapshot, in hub order.
    Roster {
        /// Entries as received, duplicates included.
        entries: Vec<RosterEntry>,
        /// Shape the snapshot arrived in.
        shape: RosterShape,
    },
    /// A chat message.
    Chat {
        /// Message text.
        body: String,
        /// Author.
        sender: RosterEntry,
    },
}

#[derive(Deserialize)]
struct TaggedRoster {
    users: Vec<RosterEntry>,
}

#[derive(Deserialize)]
struct TaggedChat {
    message: String,
    user: RosterEntry,
}

impl InboundFrame {
    /// Classify a parsed JSON frame.
    ///
    /// Roster markers win over message markers; a bare array is always
    /// treated as a roster.
    pub fn decode(value: &Value) -> Result<Self, FrameError> {
        match value {
            Value::Array(_) => {
                let entries = Vec::<RosterEntry>::deserialize(value).map_err(|e| {
                    FrameError::Malformed {
                        kind: ROSTER_MARKER,
                        message: e.to_string(),
                    }
                })?;
                Ok(Self::Roster {
                    entries,
                    shape: RosterShape::Legacy,
                })
            }
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some(ROSTER_MARKER) => {
                    let frame = TaggedRoster::deserialize(value).map_err(|e| {
                        FrameError::Malformed {
                            kind: ROSTER_MARKER,
                            message: e.to_string(),
                        }
                    })?;
                    Ok(Self::Roster {
                        entries: frame.users,
                        shape: RosterShape::Tagged,
                    })
                }
                Some(MESSAGE_MARKER) => {
                    let frame = TaggedChat::deserialize(value).map_err(|e| {
                        FrameError::Malformed {
                            kind: MESSAGE_MARKER,
                            message: e.to_string(),
                        }
                    })?;
                    Ok(Self::Chat {
                        body: frame.message,
                        sender: frame.user,
                    })
                }
                Some(other) => Err(FrameError::Unrecognized {
                    kind: format!("type={other}"),
                }),
                None => Err(FrameError::Unrecognized {
                    kind: "object without type".into(),
                }),
            },
            other => Err(FrameError::Unrecognized {
                kind: json_kind(other).into(),
            }),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Roster { .. } => ROSTER_MARKER,
            Self::Chat { .. } => MESSAGE_MARKER,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
