//! Persisted key-value storage.
//!
//! DESIGN
//! ======
//! Flat string keys and values, no schema versioning. The session store is
//! the only writer of the credential keys; app flags share the same backend
//! under unrelated keys.
//!
//! TRADE-OFFS
//! ==========
//! Multi-key writes are not atomic as a set, matching on-device stores. A
//! crash between writes can leave a partial credential record, which the
//! session store detects and discards on the next boot.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage read failed for {key}: {reason}")]
    Read { key: String, reason: String },
    #[error("storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("storage file corrupt: {0}")]
    Corrupt(String),
}

// =============================================================================
// TRAIT
// =============================================================================

/// Async key-value store seam. Object safe so it can be shared as
/// `Arc<dyn KeyValueStore>`.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Read several keys, preserving order.
    async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StorageError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Remove several keys. Keeps going after a failure and reports the
    /// first one, so as many keys as possible are gone.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut first_err = None;
        for key in keys {
            if let Err(e) = self.remove(key).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-process store for tests and preview mode.
///
/// Individual keys can be made to fail on write to exercise storage error
/// paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    failing_writes: HashSet<String>,
    fail_reads: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` of `key` fail.
    pub fn fail_writes_to(&self, key: &str) {
        self.lock().failing_writes.insert(key.to_owned());
    }

    /// Make every subsequent `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Sorted list of present keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Synchronous insert, for seeding fixtures.
    pub fn insert(&self, key: &str, value: &str) {
        self.lock().values.insert(key.to_owned(), value.to_owned());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(StorageError::Read { key: key.to_owned(), reason: "injected failure".into() });
        }
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.failing_writes.contains(key) {
            return Err(StorageError::Write { key: key.to_owned(), reason: "injected failure".into() });
        }
        inner.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock().values.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON-object file store used by the CLI.
///
/// Every mutation rewrites the whole file through a sibling temp file and a
/// rename, so readers see either the old or the new contents.
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Read { key: key.to_owned(), reason: e.to_string() }),
        }
    }

    async fn save(&self, key: &str, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let write_err = |e: &dyn std::fmt::Display| StorageError::Write { key: key.to_owned(), reason: e.to_string() };
        let bytes = serde_json::to_vec_pretty(values).map_err(|e| write_err(&e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| write_err(&e))?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| write_err(&e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| write_err(&e))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.load(key).await?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load(key).await?;
        values.insert(key.to_owned(), value.to_owned());
        self.save(key, &values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load(key).await?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.save(key, &values).await
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
