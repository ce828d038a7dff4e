//! Authentication state machine using rust-fsm.
//!
//! ```text
//!                 SignIn
//!   ┌───────────┐ ─────────► ┌───────────────┐ ──┐
//!   │ Anonymous │            │ Authenticated │   │ SignIn (replace)
//!   └───────────┘ ◄───────── └───────────────┘ ◄─┘
//!          SignOut / Expire / Reject
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Anonymous)

    Anonymous => {
        SignIn => Authenticated
    },
    Authenticated => {
        SignIn => Authenticated,
        SignOut => Anonymous,
        Expire => Anonymous,
        Reject => Anonymous
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Authentication state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Anonymous => AuthState::Anonymous,
            AuthMachineState::Authenticated => AuthState::Authenticated,
        }
    }
}

/// Payload for auth state change notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    pub state: AuthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
