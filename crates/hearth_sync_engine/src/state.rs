//! Sync state machine and pass accounting.

use chrono::{DateTime, Utc};
use hearth_sync_protocol::ResolutionKind;
use parking_lot::Mutex;
use std::time::Duration;

/// The current state of the orchestrator.
///
/// At most one non-idle state is active at a time. The flag is a cooperative
/// guard: it keeps two orchestrator passes from overlapping, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Not running a pass.
    #[default]
    Idle,
    /// Pulling every record from the remote store.
    Pulling,
    /// Pushing every local record to the remote store.
    Pushing,
    /// Running first-run migration.
    Migrating,
}

impl SyncState {
    /// Returns true if a pass is running.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }

    /// Returns the snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Pulling => "pulling",
            SyncState::Pushing => "pushing",
            SyncState::Migrating => "migrating",
        }
    }
}

/// Holds the orchestrator state and hands out pass guards.
#[derive(Debug, Default)]
pub(crate) struct StateCell(Mutex<SyncState>);

impl StateCell {
    pub(crate) fn get(&self) -> SyncState {
        *self.0.lock()
    }

    /// Moves from idle to `next`, or returns `None` if a pass is running.
    pub(crate) fn try_enter(&self, next: SyncState) -> Option<PassGuard<'_>> {
        let mut state = self.0.lock();
        if state.is_active() {
            return None;
        }
        *state = next;
        Some(PassGuard { cell: self })
    }
}

/// Returns the orchestrator to idle when dropped.
#[derive(Debug)]
pub(crate) struct PassGuard<'a> {
    cell: &'a StateCell,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.cell.0.lock() = SyncState::Idle;
    }
}

/// Which operation a pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Full pull from remote.
    Pull,
    /// Push of every local record.
    Push,
    /// First-run migration.
    Migration,
}

/// Counters for one orchestrator pass.
///
/// Created when the pass starts and handed to listeners and the caller when
/// it finishes. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPass {
    /// Which operation ran.
    pub kind: PassKind,
    /// Records replaced by the remote version.
    pub adopted: u32,
    /// Records replaced by a merge of both versions.
    pub merged: u32,
    /// Records where the local version was newer and kept.
    pub kept_local: u32,
    /// Records written to the remote store.
    pub pushed: u32,
    /// Records with nothing to do (no remote blob on pull, no local value on push).
    pub skipped: u32,
    /// Records that failed.
    pub failed: u32,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

impl SyncPass {
    pub(crate) fn new(kind: PassKind) -> Self {
        Self {
            kind,
            adopted: 0,
            merged: 0,
            kept_local: 0,
            pushed: 0,
            skipped: 0,
            failed: 0,
            duration: Duration::ZERO,
        }
    }

    /// Tallies one pull resolution.
    pub(crate) fn record_resolution(&mut self, kind: ResolutionKind) {
        match kind {
            ResolutionKind::NoRemote => self.skipped += 1,
            ResolutionKind::AdoptRemote => self.adopted += 1,
            ResolutionKind::KeepLocal => self.kept_local += 1,
            ResolutionKind::Merge => self.merged += 1,
        }
    }

    /// Records whose content moved between stores: adopted, merged into
    /// new content, or pushed. A pull that finds the local copy already
    /// current counts it as kept, not merged.
    pub fn synced_count(&self) -> u32 {
        self.adopted + self.merged + self.pushed
    }

    /// Records that failed.
    pub fn error_count(&self) -> u32 {
        self.failed
    }
}

/// Result of a full pass (pull, push-all, or migration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassResult {
    /// The pass ran; per-record failures are counted inside.
    Completed(SyncPass),
    /// The remote store is not available. Nothing was touched.
    NotAvailable,
    /// Another pass is running. Nothing was touched.
    Busy,
    /// Migration already ran on this installation.
    AlreadyMigrated,
    /// The pass could not start because its own bookkeeping failed.
    Aborted {
        /// What went wrong.
        error: String,
    },
}

impl PassResult {
    /// Returns the pass counters if the pass ran.
    pub fn pass(&self) -> Option<&SyncPass> {
        match self {
            PassResult::Completed(pass) => Some(pass),
            _ => None,
        }
    }

    /// Returns true if the pass ran.
    pub fn is_completed(&self) -> bool {
        matches!(self, PassResult::Completed(_))
    }
}

/// Why a record write stayed local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOnlyReason {
    /// The remote store is not available.
    NotAvailable,
    /// The key is not part of the configured key set.
    NotSynced,
}

/// Result of a single-record operation (push or remove).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Applied locally and remotely.
    Synced,
    /// Applied locally only.
    LocalOnly(LocalOnlyReason),
    /// Failed; the message is also broadcast as a `sync_error` event.
    Failed {
        /// What went wrong.
        error: String,
    },
}

impl RecordOutcome {
    /// Returns true if the remote store was updated.
    pub fn is_synced(&self) -> bool {
        matches!(self, RecordOutcome::Synced)
    }
}

/// Point-in-time status of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Availability as of the last check.
    pub available: bool,
    /// Current state.
    pub state: SyncState,
    /// When the last pass finished, if ever.
    pub last_sync: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_state_checks() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Pulling.is_active());
        assert!(SyncState::Pushing.is_active());
        assert!(SyncState::Migrating.is_active());
        assert_eq!(SyncState::default(), SyncState::Idle);
        assert_eq!(SyncState::Migrating.as_str(), "migrating");
    }

    #[test]
    fn only_one_pass_at_a_time() {
        let cell = StateCell::default();

        let guard = cell.try_enter(SyncState::Pulling).unwrap();
        assert_eq!(cell.get(), SyncState::Pulling);
        assert!(cell.try_enter(SyncState::Pushing).is_none());
        assert!(cell.try_enter(SyncState::Pulling).is_none());
        assert_eq!(cell.get(), SyncState::Pulling);

        drop(guard);
        assert_eq!(cell.get(), SyncState::Idle);

        let _guard = cell.try_enter(SyncState::Migrating).unwrap();
        assert_eq!(cell.get(), SyncState::Migrating);
    }

    #[test]
    fn pass_counters() {
        let mut pass = SyncPass::new(PassKind::Pull);
        pass.record_resolution(ResolutionKind::AdoptRemote);
        pass.record_resolution(ResolutionKind::Merge);
        pass.record_resolution(ResolutionKind::KeepLocal);
        pass.record_resolution(ResolutionKind::NoRemote);
        pass.failed += 1;

        assert_eq!(pass.adopted, 1);
        assert_eq!(pass.merged, 1);
        assert_eq!(pass.kept_local, 1);
        assert_eq!(pass.skipped, 1);
        assert_eq!(pass.synced_count(), 2);
        assert_eq!(pass.error_count(), 1);
    }

    #[test]
    fn pass_result_accessors() {
        let done = PassResult::Completed(SyncPass::new(PassKind::Push));
        assert!(done.is_completed());
        assert_eq!(done.pass().map(|p| p.kind), Some(PassKind::Push));

        assert!(!PassResult::Busy.is_completed());
        assert_eq!(PassResult::NotAvailable.pass(), None);
        assert!(RecordOutcome::Synced.is_synced());
        assert!(!RecordOutcome::LocalOnly(LocalOnlyReason::NotSynced).is_synced());
    }
}
