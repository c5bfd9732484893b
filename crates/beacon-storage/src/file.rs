//! File-backed storage.
//!
//! All keys live in one JSON object document. Every mutation rewrites the
//! document to a sibling temp file and renames it over the original, so a
//! crash mid-write leaves the previous document intact.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type Document = BTreeMap<String, String>;

/// Key/value store persisted as a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) the store document at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if path.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        // Fail early on an unreadable document
        store.load()?;
        Ok(store)
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StorageResult<Document> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Document::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, document: &Document) -> StorageResult<()> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        let tmp = self.path.with_file_name(format!("{}.tmp", file_name));

        let content = serde_json::to_string(document)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let mut document = self.load()?;
        document.insert(key.to_string(), value.to_string());
        self.save(&document)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock();
        let mut document = self.load()?;
        if document.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&document)?;
        Ok(true)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.into_keys().collect())
    }
}
