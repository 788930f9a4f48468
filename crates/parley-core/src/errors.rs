//! Error hierarchy for the Parley client.
//!
//! - [`RegistrationError`]: the name claim was rejected or could not be made
//! - [`ConnectionError`]: the transport could not be opened
//! - [`FrameError`]: an inbound frame could not be classified (never fatal)
//! - [`InvalidStateOperation`]: an operation was attempted in the wrong state
//! - [`ClientError`]: top-level enum wrapping all of the above
//!
//! Every error maps to an [`ErrorSeverity`] that tells the host how to react.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::SessionState;

// ─────────────────────────────────────────────────────────────────────────────
// Severity
// ─────────────────────────────────────────────────────────────────────────────

/// How the host should react to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// The user can fix it (pick another name).
    UserCorrectable,
    /// Network trouble; the user may retry manually.
    Transient,
    /// Dropped and logged; nothing to surface.
    Ignorable,
    /// Caller misuse, surfaced as a local notice.
    Usage,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserCorrectable => write!(f, "user_correctable"),
            Self::Transient => write!(f, "transient"),
            Self::Ignorable => write!(f, "ignorable"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RegistrationError
// ─────────────────────────────────────────────────────────────────────────────

/// Default text when the hub rejects a name without saying why.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Registration failed";

/// Failure of the name-claim exchange.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The hub refused the name (taken, invalid, ...).
    #[error("registration rejected: {message}")]
    Rejected {
        /// Hub-provided reason, or [`DEFAULT_REJECTION_MESSAGE`].
        message: String,
    },

    /// The request failed or the response had an unexpected shape.
    #[error("registration failed: {message}")]
    Connectivity {
        /// What went wrong.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RegistrationError {
    /// Build a rejection, falling back to the default text.
    #[must_use]
    pub fn rejected(message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string());
        Self::Rejected { message }
    }

    /// Build a connectivity failure without a source.
    #[must_use]
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: None,
        }
    }

    /// Build a connectivity failure wrapping `source`.
    #[must_use]
    pub fn connectivity_from(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connectivity {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error severity.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Rejected { .. } => ErrorSeverity::UserCorrectable,
            Self::Connectivity { .. } => ErrorSeverity::Transient,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionError
// ─────────────────────────────────────────────────────────────────────────────

/// Failure to open, or failure of, the persistent connection.
///
/// `Clone` so the same error can be handed to every `on_error` subscriber.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// The transport reported an error.
    #[error("transport error on {url}: {message}")]
    Transport {
        /// Endpoint URL.
        url: String,
        /// Transport message.
        message: String,
    },

    /// The handshake did not complete in time.
    #[error("connect to {url} timed out after {timeout_ms}ms")]
    Timeout {
        /// Endpoint URL.
        url: String,
        /// Configured limit.
        timeout_ms: u64,
    },

    /// A connect is already in flight or the link is open.
    #[error("connection already active")]
    AlreadyActive,

    /// The endpoint URL cannot be used.
    #[error("invalid endpoint {url}: {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Why it was refused.
        reason: String,
    },
}

impl ConnectionError {
    /// Error severity.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => ErrorSeverity::Transient,
            Self::AlreadyActive | Self::InvalidUrl { .. } => ErrorSeverity::Usage,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameError
// ─────────────────────────────────────────────────────────────────────────────

/// An inbound frame that cannot be turned into a domain event.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame carries a known marker but its body is invalid.
    #[error("malformed {kind} frame: {message}")]
    Malformed {
        /// Frame kind that was recognized.
        kind: &'static str,
        /// Decode failure.
        message: String,
    },

    /// The frame is valid JSON but matches no known shape.
    #[error("unrecognized frame: {kind}")]
    Unrecognized {
        /// Short description of what arrived.
        kind: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// InvalidStateOperation
// ─────────────────────────────────────────────────────────────────────────────

/// An operation attempted while the session or channel cannot perform it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvalidStateOperation {
    /// The channel has no open link.
    #[error("not connected")]
    ChannelNotOpen,

    /// The session state forbids the operation.
    #[error("cannot {operation} while {state}")]
    WrongState {
        /// Operation name.
        operation: &'static str,
        /// State at the time of the call.
        state: SessionState,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// ClientError
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the Parley client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Name claim failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Transport failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Inbound frame dropped.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Operation not allowed now.
    #[error(transparent)]
    InvalidState(#[from] InvalidStateOperation),
}

impl ClientError {
    /// Error severity.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Registration(e) => e.severity(),
            Self::Connection(e) => e.severity(),
            Self::Frame(_) => ErrorSeverity::Ignorable,
            Self::InvalidState(_) => ErrorSeverity::Usage,
        }
    }

    /// Whether the user can sensibly retry the same action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.severity(),
            ErrorSeverity::Transient | ErrorSeverity::UserCorrectable
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
