//! # Hearth Sync Engine
//!
//! Cross-device sync orchestrator for Hearth.
//!
//! This crate provides:
//! - [`SyncOrchestrator`] - pull, push and first-run migration passes
//! - Sync state machine (idle, pulling, pushing, migrating) with a busy guard
//! - [`ListenerBus`] - synchronous lifecycle events for the UI layer
//! - [`DeviceIdentity`] - the per-installation id stamped into envelopes
//!
//! ## Architecture
//!
//! Every record is synced independently, one key at a time:
//! 1. Pull: read the remote envelope, resolve it against the local value
//!    and its last-modified time, and apply the outcome locally
//! 2. Push: wrap the local value in a fresh envelope and replace the
//!    remote blob
//!
//! ## Key Invariants
//!
//! - At most one pass runs at a time; overlapping calls are refused, not queued
//! - One record's failure never aborts a pass or affects another record
//! - Public operations never return errors; failures surface as
//!   structured results and `sync_error` events
//! - An unavailable remote store leaves every counter and store untouched

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod identity;
mod listener;
mod orchestrator;
mod state;

pub use config::{SyncConfig, DEFAULT_LAST_SYNC_KEY, DEFAULT_MIGRATION_FLAG_KEY};
pub use error::{SyncError, SyncResult};
pub use identity::{DeviceIdentity, DEFAULT_DEVICE_ID_KEY, UNKNOWN_DEVICE};
pub use listener::{Listener, ListenerBus, Subscription, SyncEvent};
pub use orchestrator::SyncOrchestrator;
pub use state::{
    LocalOnlyReason, PassKind, PassResult, RecordOutcome, SyncPass, SyncState, SyncStatus,
};
