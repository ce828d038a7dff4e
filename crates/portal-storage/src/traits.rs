//! Storage trait definitions.

use crate::StorageResult;
use tracing::warn;

/// Trait for session storage backends
pub trait SecureStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store several values as one write: either all land or none do.
    ///
    /// The default writes one key at a time and puts back the previous
    /// values of already-written keys when a later write fails. Backends
    /// that can replace everything in one step should override it.
    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        let previous = entries
            .iter()
            .map(|(key, _)| self.get(key))
            .collect::<StorageResult<Vec<_>>>()?;

        for (written, (key, value)) in entries.iter().enumerate() {
            if let Err(e) = self.set(key, value) {
                for ((key, _), before) in entries[..written].iter().zip(&previous) {
                    let restored = match before {
                        Some(before) => self.set(key, before),
                        None => self.delete(key).map(|_| ()),
                    };
                    if let Err(rollback) = restored {
                        warn!(key = %key, error = %rollback, "Failed to restore value after partial write");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Delete several values. Every delete is attempted; the first error
    /// is returned.
    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.delete(key) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
