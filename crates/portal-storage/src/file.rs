//! File-backed storage.
//!
//! All keys live in one JSON object. Every write rewrites the whole file
//! through a temporary sibling and a rename, so readers never observe a
//! partially written map.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

type Map = BTreeMap<String, String>;

/// Storage persisted to a single JSON file (mode 0600 on Unix).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<Map> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &Map) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let content = serde_json::to_vec_pretty(map)?;
        {
            let mut file = open_private(&tmp_path)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), entries = map.len(), "storage file replaced");
        Ok(())
    }

    fn locked<T>(&self, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Platform("file storage lock poisoned".to_string()))?;
        f()
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.locked(|| {
            let mut map = self.read_map()?;
            map.insert(key.to_string(), value.to_string());
            self.write_map(&map)
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.locked(|| Ok(self.read_map()?.get(key).cloned()))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.locked(|| {
            let mut map = self.read_map()?;
            if map.remove(key).is_none() {
                return Ok(false);
            }
            self.write_map(&map)?;
            Ok(true)
        })
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        self.locked(|| {
            let mut map = self.read_map()?;
            for (key, value) in entries {
                map.insert(key.to_string(), value.to_string());
            }
            self.write_map(&map)
        })
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.locked(|| {
            let mut map = self.read_map()?;
            let before = map.len();
            map.retain(|key, _| !keys.contains(&key.as_str()));
            if map.len() == before {
                return Ok(());
            }
            self.write_map(&map)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));

        assert_eq!(storage.get("id_token").unwrap(), None);
        assert!(!storage.delete("id_token").unwrap());
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = FileStorage::new(&path);
        storage.set("id_token", "a.b.c").unwrap();
        storage.set("user", "{}").unwrap();
        drop(storage);

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("id_token").unwrap().as_deref(), Some("a.b.c"));
        assert!(reopened.delete("id_token").unwrap());
        assert_eq!(reopened.get("id_token").unwrap(), None);
        assert_eq!(reopened.get("user").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.set("k", "v").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
    }

    #[test]
    fn test_corrupt_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get("k"), Err(StorageError::Encoding(_))));
    }

    #[test]
    fn test_set_many_is_one_replace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);
        storage.set("id_token", "old").unwrap();
        storage.set("keep", "1").unwrap();

        storage
            .set_many(&[("id_token", "new"), ("user", "{}")])
            .unwrap();

        let on_disk: Map = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.get("id_token").map(String::as_str), Some("new"));
        assert_eq!(on_disk.get("user").map(String::as_str), Some("{}"));
        assert_eq!(on_disk.get("keep").map(String::as_str), Some("1"));

        storage.delete_many(&["id_token", "user", "absent"]).unwrap();
        let on_disk: Map = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.keys().collect::<Vec<_>>(), ["keep"]);
    }

    #[test]
    fn test_set_many_on_corrupt_file_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.set_many(&[("id_token", "t"), ("user", "{}")]).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.set("k", "v").unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
