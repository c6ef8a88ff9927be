//! In-memory stores for testing.

use crate::error::{validate_key, StoreError, StoreResult};
use crate::local::LocalStore;
use crate::remote::{RemotePath, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An in-memory remote store.
///
/// Several engines can share one instance (through `Arc`) to simulate
/// multiple devices talking to the same cloud container. Faults can be
/// injected per key to exercise partial-failure paths.
///
/// # Example
///
/// ```rust
/// use hearth_storage::{InMemoryRemoteStore, RemoteStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let remote = InMemoryRemoteStore::new();
/// let path = remote.resolve_path("journal_notes").await.unwrap();
/// remote.write(&path, b"{}").await.unwrap();
/// assert_eq!(remote.read(&path).await.unwrap(), b"{}");
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    container: String,
    blobs: RwLock<BTreeMap<RemotePath, Vec<u8>>>,
    available: AtomicBool,
    evicted: RwLock<HashSet<RemotePath>>,
    failing_writes: RwLock<HashSet<String>>,
    failing_reads: RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl InMemoryRemoteStore {
    /// Creates an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_container("memory://container/Documents/hearth_data")
    }

    /// Creates an empty store rooted at `container`.
    #[must_use]
    pub fn with_container(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            blobs: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            evicted: RwLock::new(HashSet::new()),
            failing_writes: RwLock::new(HashSet::new()),
            failing_reads: RwLock::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    fn path_for(&self, key: &str) -> RemotePath {
        RemotePath::new(format!("{}/{key}.json", self.container))
    }

    fn key_of<'p>(&self, path: &'p RemotePath) -> &'p str {
        path.as_str()
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".json"))
            .unwrap_or(path.as_str())
    }

    /// Sets whether the store reports itself available.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every write to `key` fail.
    pub fn fail_writes_for(&self, key: impl Into<String>) {
        self.failing_writes.write().insert(key.into());
    }

    /// Makes every read of `key` fail.
    pub fn fail_reads_for(&self, key: impl Into<String>) {
        self.failing_reads.write().insert(key.into());
    }

    /// Clears all injected faults.
    pub fn clear_faults(&self) {
        self.failing_writes.write().clear();
        self.failing_reads.write().clear();
    }

    /// Marks the blob for `key` as evicted: it exists, but must be
    /// materialized before it can be read.
    pub fn evict(&self, key: &str) {
        let path = self.path_for(key);
        self.evicted.write().insert(path);
    }

    /// Stores raw bytes for `key`, bypassing fault injection and counters.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        let path = self.path_for(key);
        self.blobs.write().insert(path, data.into());
    }

    /// Returns the raw bytes stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(&self.path_for(key)).cloned()
    }

    /// Returns the number of blobs stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Returns true if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Returns the number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn is_available(&self) -> StoreResult<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }

    async fn resolve_path(&self, key: &str) -> StoreResult<RemotePath> {
        validate_key(key)?;
        Ok(self.path_for(key))
    }

    async fn exists(&self, path: &RemotePath) -> StoreResult<bool> {
        Ok(self.blobs.read().contains_key(path))
    }

    async fn ensure_materialized(&self, path: &RemotePath) -> StoreResult<()> {
        if !self.blobs.read().contains_key(path) {
            return Err(StoreError::not_found(path.as_str()));
        }
        self.evicted.write().remove(path);
        Ok(())
    }

    async fn read(&self, path: &RemotePath) -> StoreResult<Vec<u8>> {
        if self.failing_reads.read().contains(self.key_of(path)) {
            return Err(StoreError::Backend(format!("injected read failure: {path}")));
        }
        if self.evicted.read().contains(path) {
            return Err(StoreError::Backend(format!("not materialized: {path}")));
        }
        self.blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(path.as_str()))
    }

    async fn write(&self, path: &RemotePath, data: &[u8]) -> StoreResult<()> {
        if self.failing_writes.read().contains(self.key_of(path)) {
            return Err(StoreError::Backend(format!("injected write failure: {path}")));
        }
        self.blobs.write().insert(path.clone(), data.to_vec());
        self.evicted.write().remove(path);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, path: &RemotePath) -> StoreResult<()> {
        self.evicted.write().remove(path);
        match self.blobs.write().remove(path) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(path.as_str())),
        }
    }
}

/// An in-memory local store.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    modified: RwLock<HashMap<String, DateTime<Utc>>>,
    failing: RwLock<HashSet<String>>,
}

impl InMemoryLocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every get and set of `key` fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing.write().insert(key.into());
    }

    /// Clears all injected faults.
    pub fn clear_faults(&self) {
        self.failing.write().clear();
    }

    /// Returns a copy of all stored values.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.values.read().clone()
    }

    /// Returns a copy of the last-modified index.
    #[must_use]
    pub fn modified_index(&self) -> HashMap<String, DateTime<Utc>> {
        self.modified.read().clone()
    }

    fn check(&self, key: &str) -> StoreResult<()> {
        if self.failing.read().contains(key) {
            return Err(StoreError::Backend(format!("injected failure: {key}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check(key)?;
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check(key)?;
        self.values.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check(key)?;
        self.values.write().remove(key);
        Ok(())
    }

    async fn last_modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.modified.read().get(key).copied())
    }

    async fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.modified.write().insert(key.to_string(), at);
        Ok(())
    }

    async fn clear_last_modified(&self, key: &str) -> StoreResult<()> {
        self.modified.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn remote_write_and_read() {
        let remote = InMemoryRemoteStore::new();
        let path = remote.resolve_path("journal_notes").await.unwrap();
        assert!(path.as_str().ends_with("/journal_notes.json"));
        assert!(!remote.exists(&path).await.unwrap());

        remote.write(&path, b"[1]").await.unwrap();
        assert!(remote.exists(&path).await.unwrap());
        assert_eq!(remote.read(&path).await.unwrap(), b"[1]");
        assert_eq!(remote.write_count(), 1);
        assert_eq!(remote.get("journal_notes"), Some(b"[1]".to_vec()));
    }

    #[tokio::test]
    async fn remote_missing_path_is_not_found() {
        let remote = InMemoryRemoteStore::new();
        let path = remote.resolve_path("achievements").await.unwrap();

        assert!(remote.read(&path).await.unwrap_err().is_not_found());
        assert!(remote.delete(&path).await.unwrap_err().is_not_found());
        assert!(remote.ensure_materialized(&path).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn remote_rejects_invalid_keys() {
        let remote = InMemoryRemoteStore::new();
        let result = remote.resolve_path("../escape").await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn remote_evicted_blob_needs_materializing() {
        let remote = InMemoryRemoteStore::new();
        remote.insert("verse_data", b"{}".to_vec());
        remote.evict("verse_data");

        let path = remote.resolve_path("verse_data").await.unwrap();
        assert!(remote.exists(&path).await.unwrap());
        assert!(remote.read(&path).await.is_err());

        remote.ensure_materialized(&path).await.unwrap();
        assert_eq!(remote.read(&path).await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn remote_fault_injection() {
        let remote = InMemoryRemoteStore::new();
        remote.fail_writes_for("total_points");
        remote.fail_reads_for("userName");

        let points = remote.resolve_path("total_points").await.unwrap();
        assert!(matches!(
            remote.write(&points, b"5").await,
            Err(StoreError::Backend(_))
        ));
        assert_eq!(remote.write_count(), 0);

        remote.insert("userName", b"\"ruth\"".to_vec());
        let name = remote.resolve_path("userName").await.unwrap();
        assert!(remote.read(&name).await.is_err());

        remote.clear_faults();
        remote.write(&points, b"5").await.unwrap();
        assert_eq!(remote.read(&name).await.unwrap(), b"\"ruth\"");
    }

    #[tokio::test]
    async fn remote_availability_toggle() {
        let remote = InMemoryRemoteStore::new();
        assert!(remote.is_available().await.unwrap());
        remote.set_available(false);
        assert!(!remote.is_available().await.unwrap());
    }

    #[tokio::test]
    async fn local_values_and_index() {
        let local = InMemoryLocalStore::new();
        assert_eq!(local.get("k").await.unwrap(), None);

        local.set("k", b"1").await.unwrap();
        assert_eq!(local.get("k").await.unwrap(), Some(b"1".to_vec()));

        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        local.set_last_modified("k", at).await.unwrap();
        assert_eq!(local.last_modified("k").await.unwrap(), Some(at));

        local.remove("k").await.unwrap();
        local.clear_last_modified("k").await.unwrap();
        assert_eq!(local.get("k").await.unwrap(), None);
        assert_eq!(local.last_modified("k").await.unwrap(), None);

        // Removing again is fine.
        local.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn local_fault_injection() {
        let local = InMemoryLocalStore::new();
        local.fail_key("broken");
        assert!(local.get("broken").await.is_err());
        assert!(local.set("broken", b"x").await.is_err());
        assert!(local.snapshot().is_empty());
    }
}
