//! Remote store contract.

use crate::error::StoreResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A resolved location of one record in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// Creates a path from its string form.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A remote blob store shared by every installation of one user.
///
/// Remote stores are **opaque byte stores**. They know nothing about
/// envelopes, timestamps or merge policy; the engine owns all of that.
/// The store is treated as eventually consistent, with no transactions
/// across paths.
///
/// # Invariants
///
/// - `write` replaces the whole blob at a path
/// - `read` and `delete` of a missing path fail with
///   [`StoreError::NotFound`](crate::StoreError::NotFound)
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryRemoteStore`] - For testing
/// - [`super::DirectoryRemoteStore`] - A mounted cloud container directory
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns true if the store can currently be used.
    async fn is_available(&self) -> StoreResult<bool>;

    /// Creates whatever container structure the store needs before use.
    async fn prepare(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Maps a record key to its remote path.
    async fn resolve_path(&self, key: &str) -> StoreResult<RemotePath>;

    /// Returns true if a blob exists at `path`.
    async fn exists(&self, path: &RemotePath) -> StoreResult<bool>;

    /// Makes sure a lazily synced blob is present locally before reading.
    async fn ensure_materialized(&self, path: &RemotePath) -> StoreResult<()>;

    /// Reads the blob at `path`.
    async fn read(&self, path: &RemotePath) -> StoreResult<Vec<u8>>;

    /// Replaces the blob at `path`.
    async fn write(&self, path: &RemotePath, data: &[u8]) -> StoreResult<()>;

    /// Deletes the blob at `path`.
    async fn delete(&self, path: &RemotePath) -> StoreResult<()>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn is_available(&self) -> StoreResult<bool> {
        (**self).is_available().await
    }

    async fn prepare(&self) -> StoreResult<()> {
        (**self).prepare().await
    }

    async fn resolve_path(&self, key: &str) -> StoreResult<RemotePath> {
        (**self).resolve_path(key).await
    }

    async fn exists(&self, path: &RemotePath) -> StoreResult<bool> {
        (**self).exists(path).await
    }

    async fn ensure_materialized(&self, path: &RemotePath) -> StoreResult<()> {
        (**self).ensure_materialized(path).await
    }

    async fn read(&self, path: &RemotePath) -> StoreResult<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &RemotePath, data: &[u8]) -> StoreResult<()> {
        (**self).write(path, data).await
    }

    async fn delete(&self, path: &RemotePath) -> StoreResult<()> {
        (**self).delete(path).await
    }
}
