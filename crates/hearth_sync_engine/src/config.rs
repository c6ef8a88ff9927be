//! Configuration for the sync engine.

use hearth_sync_protocol::{RecordKeySet, ENVELOPE_VERSION};

/// Local key recording when the last pass finished.
pub const DEFAULT_LAST_SYNC_KEY: &str = "last_cloud_sync";

/// Local key marking that first-run migration has happened.
pub const DEFAULT_MIGRATION_FLAG_KEY: &str = "cloud_migration_complete";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Record keys that participate in sync.
    pub keys: RecordKeySet,
    /// Local key holding the ISO-8601 time of the last completed pass.
    pub last_sync_key: String,
    /// Local key holding the migration-complete flag.
    pub migration_flag_key: String,
    /// Version stamped into written envelopes.
    pub envelope_version: u32,
}

impl SyncConfig {
    /// Creates a configuration syncing `keys`.
    pub fn new(keys: RecordKeySet) -> Self {
        Self {
            keys,
            last_sync_key: DEFAULT_LAST_SYNC_KEY.to_string(),
            migration_flag_key: DEFAULT_MIGRATION_FLAG_KEY.to_string(),
            envelope_version: ENVELOPE_VERSION,
        }
    }

    /// Sets the last-sync key.
    pub fn with_last_sync_key(mut self, key: impl Into<String>) -> Self {
        self.last_sync_key = key.into();
        self
    }

    /// Sets the migration flag key.
    pub fn with_migration_flag_key(mut self, key: impl Into<String>) -> Self {
        self.migration_flag_key = key.into();
        self
    }

    /// Sets the envelope version.
    pub fn with_envelope_version(mut self, version: u32) -> Self {
        self.envelope_version = version;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(RecordKeySet::standard())
    }
}
