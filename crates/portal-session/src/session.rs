//! Session manager with FSM-based state tracking.
//!
//! The manager owns the in-memory session, keeps the persisted copy in step
//! through [`SessionStore`], and is the single place that ends a session.
//! Every session end is published as a [`SessionEvent::SignedOut`] whose
//! reason tells the consumer where to send the user.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthState, AuthStateChangedPayload};
use crate::credential::{decode, is_expired_at, User};
use crate::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use portal_storage::{SessionStore, StorageError, StoredSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the session event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    /// The user signed out.
    UserRequested,
    /// The expiry watch found the token past its margin.
    Expired,
    /// The server rejected the token, or a call was attempted without one.
    Unauthorized,
    /// A persisted session was unusable at startup.
    Discarded,
}

impl SignOutReason {
    /// Where the user should land after this sign-out.
    pub fn redirect_path(&self) -> &'static str {
        match self {
            SignOutReason::UserRequested | SignOutReason::Discarded => "/",
            SignOutReason::Expired | SignOutReason::Unauthorized => "/?expired=true",
        }
    }

    /// Whether the user should be told their session expired.
    pub fn is_expiry(&self) -> bool {
        matches!(self, SignOutReason::Expired | SignOutReason::Unauthorized)
    }

    fn fsm_input(&self) -> AuthMachineInput {
        match self {
            SignOutReason::UserRequested | SignOutReason::Discarded => AuthMachineInput::SignOut,
            SignOutReason::Expired => AuthMachineInput::Expire,
            SignOutReason::Unauthorized => AuthMachineInput::Reject,
        }
    }
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { email: String },
    SignedOut { reason: SignOutReason },
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user: User,
}

/// Owner of the current session.
pub struct SessionManager {
    store: SessionStore,
    current: Mutex<Option<Session>>,
    fsm: Mutex<AuthMachine>,
    events: broadcast::Sender<SessionEvent>,
    state_callback: Mutex<Option<AuthStateCallback>>,
    clock: Clock,
}

impl SessionManager {
    /// Create a manager with no session loaded. Call [`restore`](Self::restore)
    /// to pick up a persisted one.
    pub fn new(store: SessionStore) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    /// Create a manager that reads time from `clock`.
    pub fn with_clock(store: SessionStore, clock: Clock) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            current: Mutex::new(None),
            fsm: Mutex::new(AuthMachine::new()),
            events,
            state_callback: Mutex::new(None),
            clock,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    /// Get the current FSM state.
    pub fn fsm_state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    fn transition(&self, input: &AuthMachineInput) -> SessionResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Auth state transition");
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState) {
        let email = self.current_user().map(|u| u.email);
        if let Some(callback) = self.state_callback.lock().as_ref() {
            callback(AuthStateChangedPayload { state, email });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Start a session from a raw credential.
    ///
    /// The credential is decoded first; on failure nothing changes, in memory
    /// or in storage.
    pub fn sign_in(&self, credential: &str) -> SessionResult<User> {
        let claims = decode(credential)?;
        let user = claims.user();

        self.store.save(&StoredSession {
            token: credential.to_string(),
            user: user.clone().into(),
        })?;

        *self.current.lock() = Some(Session {
            token: credential.to_string(),
            user: user.clone(),
        });
        self.transition(&AuthMachineInput::SignIn)?;

        info!(email = %user.email, expires_at = ?claims.expires_at(), "Signed in");
        self.emit(SessionEvent::SignedIn {
            email: user.email.clone(),
        });
        Ok(user)
    }

    /// End the session at the user's request. Never fails.
    pub fn sign_out(&self) {
        self.end_session(SignOutReason::UserRequested);
    }

    /// Shared recovery path for a missing or server-rejected token.
    pub fn handle_unauthorized(&self) {
        self.end_session(SignOutReason::Unauthorized);
    }

    fn end_session(&self, reason: SignOutReason) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
        let had_session = self.current.lock().take().is_some();

        // Ending an already-anonymous session is a no-op for the FSM.
        let _ = self.transition(&reason.fsm_input());

        info!(reason = ?reason, had_session, "Signed out");
        self.emit(SessionEvent::SignedOut { reason });
    }

    /// True when there is no token, it does not decode, or it is inside the
    /// expiry margin.
    pub fn is_expired(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(session) => is_expired_at(&session.token, self.now()),
            None => true,
        }
    }

    /// The token, if one is held and not expired.
    pub fn valid_token(&self) -> Option<String> {
        let now = self.now();
        self.current
            .lock()
            .as_ref()
            .filter(|session| !is_expired_at(&session.token, now))
            .map(|session| session.token.clone())
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.lock().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Expire the held session if it is past its margin.
    ///
    /// Returns true when a session was ended. Does nothing without a session.
    pub fn check_expiry(&self) -> bool {
        let now = self.now();
        let expired = self
            .current
            .lock()
            .as_ref()
            .is_some_and(|session| is_expired_at(&session.token, now));

        if expired {
            self.end_session(SignOutReason::Expired);
        }
        expired
    }

    /// Load the persisted session.
    ///
    /// Returns `Ok(true)` when a usable session was restored. An expired token
    /// or unreadable user record is cleared and reported as
    /// [`SignOutReason::Discarded`].
    pub fn restore(&self) -> SessionResult<bool> {
        let stored = match self.store.load() {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                debug!("No persisted session");
                return Ok(false);
            }
            Err(StorageError::Json(e)) => {
                warn!(error = %e, "Persisted user record unreadable, discarding session");
                self.end_session(SignOutReason::Discarded);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if is_expired_at(&stored.token, self.now()) {
            info!("Persisted session expired, discarding");
            self.end_session(SignOutReason::Discarded);
            return Ok(false);
        }

        let user = User::from(stored.user);
        let email = user.email.clone();
        *self.current.lock() = Some(Session {
            token: stored.token,
            user,
        });
        self.transition(&AuthMachineInput::SignIn)?;

        info!(email = %email, "Restored persisted session");
        Ok(true)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.fsm_state())
            .finish_non_exhaustive()
    }
}
