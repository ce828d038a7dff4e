//! CLI command implementations.

mod auth;
mod certs;
mod hosts;
mod keys;
mod profile;
mod wallets;

pub use auth::{login, logout, status, CredentialSource};
pub use certs::{certs_create, certs_download, certs_list, certs_save, certs_show};
pub use hosts::hosts_list;
pub use keys::{keys_add, keys_delete, keys_list};
pub use profile::{profile_rotate_api_key, profile_show};
pub use wallets::{wallets_add, wallets_list};

use anyhow::Result;
use portal_api::{ApiError, PortalClient, ReqwestTransport};
use portal_config::{Config, Paths};
use portal_session::{ExpiryWatch, SessionEvent, SessionManager, SignOutReason};
use portal_storage::{FileStorage, SessionStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const EXPIRED_HINT: &str = "Your session has expired. Sign in again with 'portal login'.";
const SIGN_IN_HINT: &str = "You are not signed in. Run 'portal login' first.";

/// Client wired to the persisted session for one CLI invocation.
pub struct Portal {
    pub client: PortalClient,
    pub paths: Paths,
    events: broadcast::Receiver<SessionEvent>,
    had_session: bool,
    _expiry_watch: ExpiryWatch,
    cache_listener: JoinHandle<()>,
}

impl Portal {
    /// Restore the session from `~/.portal/session.json` and build the client.
    pub fn open(config: &Config, paths: Paths) -> Result<Self> {
        paths.ensure_dirs()?;

        let storage = Arc::new(FileStorage::new(paths.session_file()));
        let session = Arc::new(SessionManager::new(SessionStore::new(storage)));
        let mut events = session.subscribe();

        let restored = match session.restore() {
            Ok(restored) => restored,
            Err(e) => {
                warn!(error = %e, "Could not restore session");
                false
            }
        };
        // A discarded session still counts: the user was signed in before.
        let discarded = drain_sign_outs(&mut events)
            .iter()
            .any(|reason| *reason == SignOutReason::Discarded);
        debug!(restored, discarded, "Session bootstrap finished");

        let transport = ReqwestTransport::new(config)?;
        let client = PortalClient::new(session.clone(), Arc::new(transport));
        let expiry_watch = session.spawn_expiry_watch(config.expiry_check_interval());
        let cache_listener = client.clear_caches_on_sign_out();

        Ok(Self {
            client,
            paths,
            events,
            had_session: restored || discarded,
            _expiry_watch: expiry_watch,
            cache_listener,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.client.session()
    }

    /// Hint to print after `error`, when it means the user must sign in.
    pub fn sign_in_hint(&mut self, error: &anyhow::Error) -> Option<&'static str> {
        let api_error = error.downcast_ref::<ApiError>()?;
        if !api_error.requires_sign_in() {
            return None;
        }

        let ended_by_expiry = drain_sign_outs(&mut self.events)
            .last()
            .is_some_and(SignOutReason::is_expiry);
        if self.had_session && (ended_by_expiry || *api_error == ApiError::Unauthorized) {
            Some(EXPIRED_HINT)
        } else {
            Some(SIGN_IN_HINT)
        }
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.cache_listener.abort();
    }
}

fn drain_sign_outs(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SignOutReason> {
    let mut reasons = Vec::new();
    loop {
        match events.try_recv() {
            Ok(SessionEvent::SignedOut { reason }) => reasons.push(reason),
            Ok(SessionEvent::SignedIn { .. }) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    reasons
}

/// Ask user for confirmation.
fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
