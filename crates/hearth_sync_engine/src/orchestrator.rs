//! The sync orchestrator.
//!
//! Coordinates the per-record pull, push and migration loops between a
//! [`RemoteStore`] and a [`LocalStore`]. Records are processed one at a time;
//! a failure on one record is counted and reported, never propagated.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::identity::DeviceIdentity;
use crate::listener::{ListenerBus, Subscription, SyncEvent};
use crate::state::{
    LocalOnlyReason, PassKind, PassResult, RecordOutcome, StateCell, SyncPass, SyncState,
    SyncStatus,
};
use chrono::{DateTime, Utc};
use hearth_storage::{LocalStore, RemotePath, RemoteStore};
use hearth_sync_protocol::{
    merge, timestamp, Conflict, RemoteEnvelope, Resolution, ResolutionKind, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What migration did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Migrated {
    /// No local value.
    Skipped,
    /// No usable remote copy; the local value was uploaded.
    Uploaded,
    /// Both sides held the record; the merge was written to both.
    Merged,
}

/// Syncs a fixed set of records between this installation and the remote store.
///
/// The orchestrator owns its collaborators; pass `Arc`-wrapped stores to
/// share them with other code. At most one full pass (pull, push-all or
/// migration) runs at a time; overlapping calls return [`PassResult::Busy`]
/// without side effects.
///
/// # Example
///
/// ```rust
/// use hearth_storage::{InMemoryLocalStore, InMemoryRemoteStore};
/// use hearth_sync_engine::{DeviceIdentity, PassResult, SyncConfig, SyncOrchestrator};
/// use hearth_sync_protocol::Value;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let sync = SyncOrchestrator::new(
///     SyncConfig::default(),
///     InMemoryRemoteStore::new(),
///     InMemoryLocalStore::new(),
///     DeviceIdentity::default(),
/// );
///
/// assert!(sync.initialize().await);
/// assert!(sync.push_one("journal_notes", &Value::from(vec!["a"])).await.is_synced());
/// assert!(matches!(sync.push_all().await, PassResult::Completed(_)));
/// # });
/// ```
pub struct SyncOrchestrator<R, L> {
    config: SyncConfig,
    remote: R,
    local: L,
    identity: DeviceIdentity,
    listeners: ListenerBus,
    state: StateCell,
    available: AtomicBool,
}

impl<R: RemoteStore, L: LocalStore> SyncOrchestrator<R, L> {
    /// Creates an orchestrator. No I/O happens until the first operation.
    pub fn new(config: SyncConfig, remote: R, local: L, identity: DeviceIdentity) -> Self {
        Self {
            config,
            remote,
            local,
            identity,
            listeners: ListenerBus::new(),
            state: StateCell::default(),
            available: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Returns the local store.
    pub fn local(&self) -> &L {
        &self.local
    }

    /// Returns the listener bus.
    pub fn listeners(&self) -> &ListenerBus {
        &self.listeners
    }

    /// Subscribes to sync events.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    /// Returns availability as of the last check.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Returns a snapshot of availability, state and last sync time.
    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            available: self.is_available(),
            state: self.state(),
            last_sync: self.last_sync_time().await,
        }
    }

    /// Returns when the last pass finished, if one ever did.
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let bytes = match self.local.get(&self.config.last_sync_key).await {
            Ok(bytes) => bytes?,
            Err(err) => {
                debug!(error = %err, "failed to read last sync time");
                return None;
            }
        };
        std::str::from_utf8(&bytes).ok().and_then(timestamp::parse)
    }

    /// Brings this installation in sync at startup.
    ///
    /// Checks availability, prepares the remote container, runs first-run
    /// migration if it has not run yet, then pulls every record. Migration
    /// goes first so pre-existing local data is merged rather than replaced
    /// by a newer remote copy. Returns whether the remote store is available.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> bool {
        if !self.refresh_availability().await {
            info!("remote store not available, running local-only");
            return false;
        }

        if let Err(err) = self.remote.prepare().await {
            warn!(error = %err, "failed to prepare remote container");
        }

        let migrated = self.migrate_if_needed().await;
        debug!(result = ?migrated, "startup migration finished");
        let pulled = self.pull_all().await;
        debug!(result = ?pulled, "startup pull finished");

        self.is_available()
    }

    /// Pulls every record from the remote store and reconciles it locally.
    ///
    /// Availability is checked before the busy guard is taken, so an
    /// unavailable remote store leaves the state idle throughout.
    #[tracing::instrument(skip(self))]
    pub async fn pull_all(&self) -> PassResult {
        if !self.refresh_availability().await {
            return PassResult::NotAvailable;
        }
        let Some(_pass) = self.state.try_enter(SyncState::Pulling) else {
            debug!(state = self.state().as_str(), "pull refused, pass in progress");
            return PassResult::Busy;
        };

        let started = Instant::now();
        let mut pass = SyncPass::new(PassKind::Pull);
        info!(keys = self.config.keys.len(), "pull started");
        self.listeners.emit(&SyncEvent::SyncStarted);

        for key in self.config.keys.iter() {
            match self.pull_key(key).await {
                Ok(kind) => {
                    debug!(key = %key, outcome = kind.as_str(), "pulled record");
                    pass.record_resolution(kind);
                }
                Err(err) => self.key_failed(&mut pass, key, &err),
            }
        }

        self.finish_pass(pass, started).await
    }

    /// Stores `value` locally and immediately pushes it to the remote store.
    ///
    /// Call this after every local mutation of a record. The local write
    /// always happens; the remote write only for synced keys while the
    /// remote store is available. Does not take part in the busy guard.
    #[tracing::instrument(skip(self, value))]
    pub async fn push_one(&self, key: &str, value: &Value) -> RecordOutcome {
        let at = timestamp::now();
        if let Err(err) = self.write_local(key, value, at).await {
            self.report_key_error(key, &err);
            return RecordOutcome::Failed {
                error: err.to_string(),
            };
        }

        if !self.config.keys.contains(key) {
            debug!(key = %key, "stored locally, key is not synced");
            return RecordOutcome::LocalOnly(LocalOnlyReason::NotSynced);
        }
        if !self.refresh_availability().await {
            return RecordOutcome::LocalOnly(LocalOnlyReason::NotAvailable);
        }

        match self.upload(key, value, at).await {
            Ok(()) => {
                debug!(key = %key, "pushed record");
                RecordOutcome::Synced
            }
            Err(err) => {
                self.report_key_error(key, &err);
                RecordOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Pushes every record that has a local value.
    #[tracing::instrument(skip(self))]
    pub async fn push_all(&self) -> PassResult {
        if !self.refresh_availability().await {
            return PassResult::NotAvailable;
        }
        let Some(_pass) = self.state.try_enter(SyncState::Pushing) else {
            debug!(state = self.state().as_str(), "push refused, pass in progress");
            return PassResult::Busy;
        };

        let started = Instant::now();
        let mut pass = SyncPass::new(PassKind::Push);
        info!(keys = self.config.keys.len(), "push started");
        self.listeners.emit(&SyncEvent::SyncStarted);

        for key in self.config.keys.iter() {
            match self.push_key(key).await {
                Ok(true) => pass.pushed += 1,
                Ok(false) => pass.skipped += 1,
                Err(err) => self.key_failed(&mut pass, key, &err),
            }
        }

        self.finish_pass(pass, started).await
    }

    /// Reconciles pre-existing local data with the remote store, once per
    /// installation.
    ///
    /// Local-only records are uploaded; records present on both sides are
    /// merged and the result written to both. The persisted flag is set
    /// once the pass completes, whatever the per-record outcomes.
    #[tracing::instrument(skip(self))]
    pub async fn migrate_if_needed(&self) -> PassResult {
        if !self.refresh_availability().await {
            return PassResult::NotAvailable;
        }
        let Some(_pass) = self.state.try_enter(SyncState::Migrating) else {
            debug!(
                state = self.state().as_str(),
                "migration refused, pass in progress"
            );
            return PassResult::Busy;
        };

        match self.local.get(&self.config.migration_flag_key).await {
            Ok(Some(_)) => {
                debug!("migration already complete");
                return PassResult::AlreadyMigrated;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "failed to read migration flag");
                let error = format!("failed to read migration flag: {err}");
                self.listeners.emit(&SyncEvent::MigrationError {
                    message: error.clone(),
                });
                return PassResult::Aborted { error };
            }
        }

        let started = Instant::now();
        let mut pass = SyncPass::new(PassKind::Migration);
        info!(keys = self.config.keys.len(), "migration started");
        self.listeners.emit(&SyncEvent::MigrationStarted);

        for key in self.config.keys.iter() {
            match self.migrate_key(key).await {
                Ok(migrated) => {
                    debug!(key = %key, outcome = ?migrated, "migrated record");
                    match migrated {
                        Migrated::Skipped => pass.skipped += 1,
                        Migrated::Uploaded => pass.pushed += 1,
                        Migrated::Merged => pass.merged += 1,
                    }
                }
                Err(err) => self.key_failed(&mut pass, key, &err),
            }
        }

        let stamp = timestamp::format(timestamp::now());
        if let Err(err) = self
            .local
            .set(&self.config.migration_flag_key, stamp.as_bytes())
            .await
        {
            warn!(error = %err, "failed to set migration flag");
            self.listeners.emit(&SyncEvent::MigrationError {
                message: format!("failed to set migration flag: {err}"),
            });
        }

        self.finish_pass(pass, started).await
    }

    /// Deletes a record locally and, for synced keys, remotely.
    ///
    /// A remote blob that is already gone is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_record(&self, key: &str) -> RecordOutcome {
        if let Err(err) = self.remove_local(key).await {
            self.report_key_error(key, &err);
            return RecordOutcome::Failed {
                error: err.to_string(),
            };
        }

        if !self.config.keys.contains(key) {
            return RecordOutcome::LocalOnly(LocalOnlyReason::NotSynced);
        }
        if !self.refresh_availability().await {
            return RecordOutcome::LocalOnly(LocalOnlyReason::NotAvailable);
        }

        match self.delete_remote(key).await {
            Ok(()) => {
                debug!(key = %key, "removed record");
                RecordOutcome::Synced
            }
            Err(err) => {
                self.report_key_error(key, &err);
                RecordOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Reads a record from the local store.
    ///
    /// Malformed local data reads as `None`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.read_local(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to read record");
                None
            }
        }
    }

    async fn refresh_availability(&self) -> bool {
        let available = match self.remote.is_available().await {
            Ok(available) => available,
            Err(err) => {
                warn!(error = %err, "availability check failed");
                false
            }
        };
        if !available {
            debug!("remote store not available");
        }
        self.available.store(available, Ordering::Release);
        available
    }

    async fn pull_key(&self, key: &str) -> SyncResult<ResolutionKind> {
        let path = self.remote.resolve_path(key).await?;
        if !self.remote.exists(&path).await? {
            return Ok(ResolutionKind::NoRemote);
        }
        let envelope = self.read_envelope(&path).await?;

        let local = self.read_local(key).await?;
        let local_modified_at = self.local.last_modified(key).await?;
        let resolution =
            Conflict::new(local.as_ref(), local_modified_at, Some(&envelope)).resolve();

        match &resolution {
            // Already holds this content: no write, no restamp.
            Resolution::AdoptRemote(value) | Resolution::Merge(value)
                if local.as_ref() == Some(value) =>
            {
                Ok(ResolutionKind::KeepLocal)
            }
            Resolution::AdoptRemote(value) => {
                // Stamp with the remote time so the next pull sees a tie.
                let at = envelope.modified_at().unwrap_or_else(timestamp::now);
                self.write_local(key, value, at).await?;
                Ok(ResolutionKind::AdoptRemote)
            }
            Resolution::Merge(value) => {
                self.write_local(key, value, timestamp::now()).await?;
                Ok(ResolutionKind::Merge)
            }
            Resolution::KeepLocal | Resolution::NoRemote => Ok(resolution.kind()),
        }
    }

    /// Returns `false` if there was nothing to push.
    async fn push_key(&self, key: &str) -> SyncResult<bool> {
        let Some(bytes) = self.local.get(key).await? else {
            return Ok(false);
        };
        let value = Value::from_json_slice(&bytes)?;
        if value.is_null() {
            return Ok(false);
        }
        self.upload(key, &value, timestamp::now()).await?;
        Ok(true)
    }

    async fn migrate_key(&self, key: &str) -> SyncResult<Migrated> {
        let local = match self.read_local(key).await? {
            Some(value) if !value.is_null() => value,
            _ => return Ok(Migrated::Skipped),
        };

        let path = self.remote.resolve_path(key).await?;
        let remote = if self.remote.exists(&path).await? {
            self.materialize(&path).await;
            let bytes = self.remote.read(&path).await?;
            match RemoteEnvelope::decode(&bytes) {
                Ok(envelope) if envelope.has_data() => Some(envelope.data),
                Ok(_) => None,
                Err(err) => {
                    warn!(
                        key = %key,
                        error = %err,
                        "remote record unreadable, uploading local copy"
                    );
                    None
                }
            }
        } else {
            None
        };

        let at = timestamp::now();
        match remote {
            None => {
                self.upload(key, &local, at).await?;
                Ok(Migrated::Uploaded)
            }
            Some(remote) => {
                let merged = merge::merge(&local, &remote).unwrap_or(remote);
                self.write_local(key, &merged, at).await?;
                self.upload(key, &merged, at).await?;
                Ok(Migrated::Merged)
            }
        }
    }

    async fn materialize(&self, path: &RemotePath) {
        if let Err(err) = self.remote.ensure_materialized(path).await {
            // Often just means the blob is already local; the read decides.
            debug!(path = %path, error = %err, "materialize failed");
        }
    }

    async fn read_envelope(&self, path: &RemotePath) -> SyncResult<RemoteEnvelope> {
        self.materialize(path).await;
        let bytes = self.remote.read(path).await?;
        Ok(RemoteEnvelope::decode(&bytes)?)
    }

    async fn read_local(&self, key: &str) -> SyncResult<Option<Value>> {
        let Some(bytes) = self.local.get(key).await? else {
            return Ok(None);
        };
        match Value::from_json_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                debug!(key = %key, error = %err, "malformed local value, treating as absent");
                Ok(None)
            }
        }
    }

    async fn write_local(&self, key: &str, value: &Value, at: DateTime<Utc>) -> SyncResult<()> {
        let bytes = value.to_json_vec()?;
        self.local.set(key, &bytes).await?;
        self.local.set_last_modified(key, at).await?;
        Ok(())
    }

    async fn remove_local(&self, key: &str) -> SyncResult<()> {
        self.local.remove(key).await?;
        self.local.clear_last_modified(key).await?;
        Ok(())
    }

    async fn upload(&self, key: &str, value: &Value, at: DateTime<Utc>) -> SyncResult<()> {
        let device_id = self.identity.resolve(&self.local).await;
        let envelope = RemoteEnvelope::wrap(value.clone(), at, device_id)
            .with_version(self.config.envelope_version);
        let bytes = envelope.encode()?;

        let path = self.remote.resolve_path(key).await?;
        self.remote.write(&path, &bytes).await?;
        Ok(())
    }

    async fn delete_remote(&self, key: &str) -> SyncResult<()> {
        let path = self.remote.resolve_path(key).await?;
        match self.remote.delete(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn key_failed(&self, pass: &mut SyncPass, key: &str, err: &SyncError) {
        pass.failed += 1;
        self.report_key_error(key, err);
    }

    fn report_key_error(&self, key: &str, err: &SyncError) {
        warn!(key = %key, error = %err, "record sync failed");
        self.listeners.emit(&SyncEvent::SyncError {
            key: Some(key.to_string()),
            message: err.to_string(),
        });
    }

    async fn finish_pass(&self, mut pass: SyncPass, started: Instant) -> PassResult {
        let stamp = timestamp::format(timestamp::now());
        if let Err(err) = self
            .local
            .set(&self.config.last_sync_key, stamp.as_bytes())
            .await
        {
            warn!(error = %err, "failed to record last sync time");
            self.listeners.emit(&SyncEvent::SyncError {
                key: None,
                message: format!("failed to record last sync time: {err}"),
            });
        }

        pass.duration = started.elapsed();
        info!(
            kind = ?pass.kind,
            synced = pass.synced_count(),
            kept_local = pass.kept_local,
            skipped = pass.skipped,
            failed = pass.failed,
            duration_ms = pass.duration.as_millis() as u64,
            "pass finished"
        );

        let event = match pass.kind {
            PassKind::Migration => SyncEvent::MigrationCompleted(pass.clone()),
            PassKind::Pull | PassKind::Push => SyncEvent::SyncCompleted(pass.clone()),
        };
        self.listeners.emit(&event);
        PassResult::Completed(pass)
    }
}

impl<R, L> std::fmt::Debug for SyncOrchestrator<R, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("keys", &self.config.keys.len())
            .field("state", &self.state.get())
            .field("available", &self.available.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
