//! Session management for the portal client.
//!
//! This crate provides:
//! - Decoding of the identity-provider credential (no signature check)
//! - Expiry rules with a fixed safety margin
//! - An explicit FSM-based auth state
//! - `SessionManager`: sign-in, sign-out, unauthorized recovery, bootstrap
//! - A periodic expiry watch
//!
//! Consumers learn about session loss through [`SessionEvent`]s broadcast by
//! the manager; each sign-out carries a [`SignOutReason`] that maps to the
//! page the user should land on.

mod auth_fsm;
mod credential;
mod error;
mod session;
mod watch;

pub use auth_fsm::auth_machine;
pub use auth_fsm::{
    AuthMachine, AuthMachineInput, AuthMachineState, AuthState, AuthStateChangedPayload,
};
pub use credential::{decode, is_expired_at, Claims, User, EXPIRY_MARGIN_MS};
pub use error::{SessionError, SessionResult};
pub use session::{
    AuthStateCallback, Clock, SessionEvent, SessionManager, SignOutReason, EVENT_CHANNEL_CAPACITY,
};
pub use watch::ExpiryWatch;
