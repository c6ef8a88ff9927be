//! Directory-backed stores for persistent storage.

use crate::error::{validate_key, StoreError, StoreResult};
use crate::local::LocalStore;
use crate::remote::{RemotePath, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default name of the record directory inside a cloud container.
pub const DEFAULT_DATA_DIR: &str = "hearth_data";

/// Directory holding the last-modified index of a [`DirectoryLocalStore`].
const MODIFIED_DIR: &str = ".modified";

fn map_not_found(err: io::Error, path: &Path) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::not_found(path.display().to_string())
    } else {
        StoreError::Io(err)
    }
}

/// Writes `data` to a sibling temp file and renames it over `path`, so a
/// reader never observes a partially written blob.
///
/// The temp name starts with `.`, which no valid key does.
async fn replace_file(path: &Path, data: &[u8]) -> StoreResult<()> {
    let Some(name) = path.file_name() else {
        return Err(StoreError::InvalidKey(path.display().to_string()));
    };
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// A remote store backed by a mounted cloud container directory.
///
/// Records live at `<container>/Documents/<data_dir>/<key>.json`. The store
/// is available when the container root exists, which is how a signed-out
/// or unmounted container shows up on disk.
///
/// # Example
///
/// ```no_run
/// use hearth_storage::{DirectoryRemoteStore, RemoteStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let remote = DirectoryRemoteStore::new("/mnt/cloud/iCloud~app");
/// remote.prepare().await.unwrap();
/// let path = remote.resolve_path("journal_notes").await.unwrap();
/// remote.write(&path, br#"{"data":[]}"#).await.unwrap();
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryRemoteStore {
    container: PathBuf,
    data_dir: String,
}

impl DirectoryRemoteStore {
    /// Creates a store rooted at `container` using [`DEFAULT_DATA_DIR`].
    pub fn new(container: impl Into<PathBuf>) -> Self {
        Self::with_data_dir(container, DEFAULT_DATA_DIR)
    }

    /// Creates a store rooted at `container` with a custom data directory.
    pub fn with_data_dir(container: impl Into<PathBuf>, data_dir: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Returns the directory records are written to.
    #[must_use]
    pub fn records_dir(&self) -> PathBuf {
        self.container.join("Documents").join(&self.data_dir)
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemoteStore {
    async fn is_available(&self) -> StoreResult<bool> {
        match fs::metadata(&self.container).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn prepare(&self) -> StoreResult<()> {
        fs::create_dir_all(self.records_dir()).await?;
        Ok(())
    }

    async fn resolve_path(&self, key: &str) -> StoreResult<RemotePath> {
        validate_key(key)?;
        let path = self.records_dir().join(format!("{key}.json"));
        Ok(RemotePath::new(path.display().to_string()))
    }

    async fn exists(&self, path: &RemotePath) -> StoreResult<bool> {
        Ok(fs::try_exists(path.as_str()).await?)
    }

    async fn ensure_materialized(&self, path: &RemotePath) -> StoreResult<()> {
        // A plain directory has no lazy downloads; only presence matters.
        fs::metadata(path.as_str())
            .await
            .map(|_| ())
            .map_err(|e| map_not_found(e, Path::new(path.as_str())))
    }

    async fn read(&self, path: &RemotePath) -> StoreResult<Vec<u8>> {
        fs::read(path.as_str())
            .await
            .map_err(|e| map_not_found(e, Path::new(path.as_str())))
    }

    async fn write(&self, path: &RemotePath, data: &[u8]) -> StoreResult<()> {
        let path = Path::new(path.as_str());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        replace_file(path, data).await
    }

    async fn delete(&self, path: &RemotePath) -> StoreResult<()> {
        fs::remove_file(path.as_str())
            .await
            .map_err(|e| map_not_found(e, Path::new(path.as_str())))
    }
}

/// A local store that keeps one file per key.
///
/// Values live at `<root>/<key>`; the last-modified index lives at
/// `<root>/.modified/<key>` as RFC 3339 text. An index entry that fails to
/// parse reads as absent.
#[derive(Debug, Clone)]
pub struct DirectoryLocalStore {
    root: PathBuf,
}

impl DirectoryLocalStore {
    /// Opens or creates a store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(MODIFIED_DIR)).await?;
        Ok(Self { root })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn modified_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(MODIFIED_DIR).join(key))
    }
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn remove_optional(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl LocalStore for DirectoryLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        read_optional(&self.value_path(key)?).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        replace_file(&self.value_path(key)?, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        remove_optional(&self.value_path(key)?).await
    }

    async fn last_modified(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let Some(bytes) = read_optional(&self.modified_path(key)?).await? else {
            return Ok(None);
        };
        let parsed = std::str::from_utf8(&bytes)
            .ok()
            .and_then(|text| DateTime::parse_from_rfc3339(text.trim()).ok())
            .map(|at| at.with_timezone(&Utc));
        Ok(parsed)
    }

    async fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> StoreResult<()> {
        let text = at.to_rfc3339_opts(SecondsFormat::Millis, true);
        replace_file(&self.modified_path(key)?, text.as_bytes()).await
    }

    async fn clear_last_modified(&self, key: &str) -> StoreResult<()> {
        remove_optional(&self.modified_path(key)?).await
    }
}
