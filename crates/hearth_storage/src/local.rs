//! Local key-value store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The on-device key-value store.
///
/// Besides plain values, a local store keeps a side table of the wall-clock
/// time each record was last written through the engine. That table is used
/// only for conflict comparison and is never synced.
///
/// # Implementors
///
/// - [`super::InMemoryLocalStore`] - For testing
/// - [`super::DirectoryLocalStore`] - One file per key
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Reads the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Reads the last-modified time recorded for `key`.
    async fn last_modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>>;

    /// Records the last-modified time for `key`.
    async fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Drops the last-modified entry for `key`.
    async fn clear_last_modified(&self, key: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: LocalStore + ?Sized> LocalStore for Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key).await
    }

    async fn last_modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        (**self).last_modified(key).await
    }

    async fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> StoreResult<()> {
        (**self).set_last_modified(key, at).await
    }

    async fn clear_last_modified(&self, key: &str) -> StoreResult<()> {
        (**self).clear_last_modified(key).await
    }
}
