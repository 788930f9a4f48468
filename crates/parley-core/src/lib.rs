//! # parley-core
//!
//! Foundation types shared by every Parley crate.
//!
//! - **Branded IDs**: [`UserId`] as a newtype over the hub-assigned opaque id
//! - **Domain model**: [`Identity`], [`RosterEntry`], [`ChatMessage`], [`SessionState`]
//! - **Wire frames**: [`OutboundFrame`] and the tolerant [`InboundFrame`] decode
//! - **Errors**: registration, connection, frame and state errors via `thiserror`
//! - **Backoff**: [`ReconnectPolicy`] and exponential backoff math

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod ids;
pub mod model;
pub mod retry;
pub mod state;

pub use errors::{
    ClientError, ConnectionError, ErrorSeverity, FrameError, InvalidStateOperation,
    RegistrationError,
};
pub use frames::{
    InboundFrame, OutboundFrame, RegistrationRequest, RegistrationResponse, RosterShape,
};
pub use ids::UserId;
pub use model::{ChatMessage, Identity, RosterEntry};
pub use retry::ReconnectPolicy;
pub use state::SessionState;
