//! # parley-client
//!
//! The moving parts of a Parley chat session:
//!
//! - [`identity`]: claims a display name over HTTP ([`IdentityClient`])
//! - [`channel`]: the persistent WebSocket link with event subscriptions
//!   ([`ConnectionChannel`])
//! - [`session`]: the state machine tying both together
//!   ([`SessionController`])
//! - [`render`]: the [`RenderingSink`] seam a host UI implements
//!
//! A typical host registers, connects, then pumps
//! [`SessionController::next_event`] alongside its own input loop.

#![deny(unsafe_code)]

pub mod channel;
pub mod identity;
pub mod render;
pub mod session;

pub use channel::{ChannelConfig, ChannelEvent, CloseInfo, ConnectionChannel, EventKind, Subscription};
pub use identity::{IdentityClient, Registrar};
pub use render::{Notice, RecordingSink, Rendered, RenderingSink, RosterView};
pub use session::{SessionController, SessionEvent};
