//! # Hearth Sync Protocol
//!
//! Record payloads, remote envelopes, merge strategies and conflict
//! resolution for Hearth cloud sync.
//!
//! This crate provides:
//! - [`Value`], a closed JSON variant (scalar, list, map)
//! - [`RemoteEnvelope`], the metadata-wrapped form of a record stored remotely
//! - [`RecordKeySet`], the versioned list of keys that participate in sync
//! - List union and structural merge ([`merge`])
//! - Per-record conflict resolution ([`Conflict`])
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod envelope;
mod error;
mod keys;
pub mod merge;
pub mod timestamp;
mod value;

pub use conflict::{Conflict, Resolution, ResolutionKind};
pub use envelope::{RemoteEnvelope, ENVELOPE_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use keys::{RecordKeySet, STANDARD_KEYS, STANDARD_KEYS_VERSION};
pub use value::{Scalar, Shape, Value};
