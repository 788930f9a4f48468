//! Session state machine.
//!
//! [`SessionController`] owns the identity, the roster and the
//! [`SessionState`](parley_core::SessionState). Channel events reach it through
//! its own subscriptions and are applied when the host pumps
//! [`SessionController::next_event`]; every mutation happens through
//! `&mut self`.

mod controller;

pub use controller::{CONNECTIVITY_HINT, SessionController};

use parley_core::{ChatMessage, ConnectionError, FrameError, RosterShape};

use crate::channel::CloseInfo;

/// What applying one channel event did.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The pending connect completed.
    Connected,
    /// The roster was replaced and rendered.
    RosterUpdated {
        /// Number of entries in the new roster.
        entries: usize,
        /// Wire shape the roster arrived in.
        shape: RosterShape,
    },
    /// A chat message was rendered.
    MessageReceived {
        /// The message.
        message: ChatMessage,
        /// Sent by the local user.
        is_own: bool,
    },
    /// The link closed; the session is back to authenticated-disconnected.
    Disconnected(CloseInfo),
    /// The transport reported an error.
    TransportError(ConnectionError),
    /// A frame could not be classified and was dropped.
    FrameDropped(FrameError),
    /// The event does not apply in the current state.
    Ignored,
}
