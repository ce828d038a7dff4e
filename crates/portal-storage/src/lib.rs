//! Session persistence for the portal client.
//!
//! Values are plain strings behind the [`SecureStorage`] trait:
//! - [`MemoryStorage`]: process-lifetime storage (tests, ephemeral sessions)
//! - [`FileStorage`]: a single JSON map on disk, replaced atomically on write
//!
//! [`SessionStore`] is the typed view the session manager uses.

mod file;
mod keys;
mod memory;
mod session_store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session_store::{SessionStore, StoredSession, StoredUser};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure (poisoned lock, unusable path, ...)
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Stored bytes could not be interpreted
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
