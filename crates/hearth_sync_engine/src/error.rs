//! Error types for the sync engine.

use hearth_storage::StoreError;
use hearth_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing a record.
///
/// These never escape the orchestrator's public operations; they are logged,
/// counted against the record, and reported through
/// [`SyncEvent::SyncError`](crate::SyncEvent::SyncError).
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote or local store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A value or envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SyncError {
    /// Returns true if the underlying failure was a missing remote blob.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Store(err) if err.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::from(StoreError::Unavailable);
        assert!(err.to_string().starts_with("store error: "));

        let err = SyncError::from(ProtocolError::decoding("eof"));
        assert!(err.to_string().starts_with("codec error: "));
        assert!(err.to_string().contains("eof"));
    }

    #[test]
    fn not_found_passthrough() {
        assert!(SyncError::from(StoreError::not_found("x.json")).is_not_found());
        assert!(!SyncError::from(StoreError::Unavailable).is_not_found());
        assert!(!SyncError::from(ProtocolError::encoding("nan")).is_not_found());
    }
}
