//! # Hearth Storage
//!
//! Store contracts and reference adapters for Hearth sync.
//!
//! This crate provides the two collaborators the sync engine talks to:
//!
//! - [`RemoteStore`] - a per-user cloud container holding one blob per record
//! - [`LocalStore`] - the on-device key-value store plus its last-modified index
//!
//! Both are **opaque byte stores**. They do not interpret envelopes,
//! timestamps or merge rules; the engine owns all of that.
//!
//! ## Available Adapters
//!
//! - [`InMemoryRemoteStore`], [`InMemoryLocalStore`] - For testing, with fault injection
//! - [`DirectoryRemoteStore`] - A mounted cloud container directory
//! - [`DirectoryLocalStore`] - One file per key on local disk

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod local;
mod memory;
mod remote;

pub use directory::{DirectoryLocalStore, DirectoryRemoteStore, DEFAULT_DATA_DIR};
pub use error::{validate_key, StoreError, StoreResult};
pub use local::LocalStore;
pub use memory::{InMemoryLocalStore, InMemoryRemoteStore};
pub use remote::{RemotePath, RemoteStore};
