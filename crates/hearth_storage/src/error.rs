//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored at the given path or key.
    #[error("not found: {path}")]
    NotFound {
        /// The path or key that was looked up.
        path: String,
    },

    /// The remote store cannot be reached (offline or not signed in).
    #[error("store unavailable")]
    Unavailable,

    /// The key cannot be mapped onto the store's namespace.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Returns true if this error means "nothing there".
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound { .. } => true,
            StoreError::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Checks that a key is safe to use as a file name.
///
/// Keys are non-empty, do not start with `.`, and contain only ASCII
/// letters, digits, `_`, `-` and `.`.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
