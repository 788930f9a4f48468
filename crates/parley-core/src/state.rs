//! Session lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a chat session.
///
/// Owned by the session controller; other components only ever see copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No identity yet.
    Unauthenticated,
    /// A registration call is in flight.
    Registering,
    /// Identity acquired, transport not open.
    AuthenticatedDisconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Transport open, commands may be sent.
    Connected,
    /// Exit frame is being sent.
    Exiting,
    /// Session finished; nothing further happens.
    Terminated,
}

impl SessionState {
    /// Whether outbound domain commands may be dispatched.
    #[must_use]
    pub fn accepts_commands(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether an identity is held in this state.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        matches!(
            self,
            Self::AuthenticatedDisconnected | Self::Connecting | Self::Connected | Self::Exiting
        )
    }

    /// Whether the session has ended.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// States reachable from this one. Teardown may leave any live state.
    #[must_use]
    pub const fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Unauthenticated => &[Self::Registering, Self::Exiting, Self::Terminated],
            Self::Registering => &[
                Self::AuthenticatedDisconnected,
                Self::Unauthenticated,
                Self::Exiting,
                Self::Terminated,
            ],
            Self::AuthenticatedDisconnected => &[Self::Connecting, Self::Exiting, Self::Terminated],
            Self::Connecting => &[
                Self::Connected,
                Self::AuthenticatedDisconnected,
                Self::Exiting,
                Self::Terminated,
            ],
            Self::Connected => &[
                Self::AuthenticatedDisconnected,
                Self::Exiting,
                Self::Terminated,
            ],
            Self::Exiting => &[Self::Terminated],
            Self::Terminated => &[],
        }
    }

    /// Whether moving to `target` is allowed.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Registering => write!(f, "registering"),
            Self::AuthenticatedDisconnected => write!(f, "authenticated_disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Exiting => write!(f, "exiting"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}
