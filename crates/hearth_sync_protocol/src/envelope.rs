//! The remote envelope: a record as persisted in the remote store.

use crate::error::{ProtocolError, ProtocolResult};
use crate::timestamp;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

fn default_version() -> u32 {
    ENVELOPE_VERSION
}

/// A record value wrapped with the metadata needed for conflict resolution.
///
/// Envelopes are always written whole; there is no field-level remote update.
/// On the wire this is a JSON object:
///
/// ```json
/// {"data": ..., "lastModified": "2024-03-09T07:05:01.000Z", "deviceId": "device_...", "version": 1}
/// ```
///
/// Every field except `data` may be missing when decoding, in which case
/// `lastModified` and `deviceId` are empty and `version` is 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEnvelope {
    /// The record payload.
    #[serde(default)]
    pub data: Value,
    /// ISO-8601 time the envelope was written.
    #[serde(default)]
    pub last_modified: String,
    /// Installation that wrote the envelope.
    #[serde(default)]
    pub device_id: String,
    /// Envelope format version.
    #[serde(default = "default_version")]
    pub version: u32,
}

impl RemoteEnvelope {
    /// Wraps a value in a fresh envelope stamped with `at` and `device_id`.
    pub fn wrap(data: Value, at: DateTime<Utc>, device_id: impl Into<String>) -> Self {
        Self {
            data,
            last_modified: timestamp::format(at),
            device_id: device_id.into(),
            version: ENVELOPE_VERSION,
        }
    }

    /// Sets the envelope version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns true if the envelope carries a non-null payload.
    pub fn has_data(&self) -> bool {
        !self.data.is_null()
    }

    /// Returns the modification time, if it can be compared.
    ///
    /// A missing `lastModified` counts as the Unix epoch. A present but
    /// unparseable one yields `None`.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        if self.last_modified.is_empty() {
            return Some(DateTime::<Utc>::default());
        }
        timestamp::parse(&self.last_modified)
    }

    /// Encodes to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::encoding(e.to_string()))
    }

    /// Decodes from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decoding(e.to_string()))
    }
}
