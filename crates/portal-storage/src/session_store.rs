//! Typed access to the persisted session.

use crate::{SecureStorage, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Display profile persisted next to the token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

/// Token plus the user record derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user: StoredUser,
}

/// Reads and writes the `{id_token, user}` pair.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SecureStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Persist both values in one write, replacing any previous session.
    /// On error the previous session is still what is stored.
    pub fn save(&self, session: &StoredSession) -> StorageResult<()> {
        let user = serde_json::to_string(&session.user)?;
        self.storage.set_many(&[
            (StorageKeys::ID_TOKEN, session.token.as_str()),
            (StorageKeys::USER, user.as_str()),
        ])?;
        debug!(email = %session.user.email, "session persisted");
        Ok(())
    }

    /// Load the persisted session.
    ///
    /// Returns `Ok(None)` unless both values are present. A user record that
    /// is not valid JSON is reported as [`crate::StorageError::Json`].
    pub fn load(&self) -> StorageResult<Option<StoredSession>> {
        let token = self.storage.get(StorageKeys::ID_TOKEN)?;
        let user = self.storage.get(StorageKeys::USER)?;

        match (token, user) {
            (Some(token), Some(user)) => {
                let user: StoredUser = serde_json::from_str(&user)?;
                Ok(Some(StoredSession { token, user }))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("ignoring incomplete persisted session");
                Ok(None)
            }
        }
    }

    /// Remove both values.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage
            .delete_many(&[StorageKeys::ID_TOKEN, StorageKeys::USER])
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
