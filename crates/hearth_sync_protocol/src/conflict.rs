//! Conflict detection and resolution.

use crate::envelope::RemoteEnvelope;
use crate::merge;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// Outcome of resolving one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No usable remote envelope; nothing to do.
    NoRemote,
    /// Replace the local value with the remote payload.
    AdoptRemote(Value),
    /// Keep the local value; a later push propagates it.
    KeepLocal,
    /// Replace the local value with a merge of both sides.
    Merge(Value),
}

impl Resolution {
    /// Returns the kind of this resolution.
    pub fn kind(&self) -> ResolutionKind {
        match self {
            Resolution::NoRemote => ResolutionKind::NoRemote,
            Resolution::AdoptRemote(_) => ResolutionKind::AdoptRemote,
            Resolution::KeepLocal => ResolutionKind::KeepLocal,
            Resolution::Merge(_) => ResolutionKind::Merge,
        }
    }

    /// Returns the value the local store should hold afterwards, if it changes.
    pub fn new_local_value(&self) -> Option<&Value> {
        match self {
            Resolution::AdoptRemote(value) | Resolution::Merge(value) => Some(value),
            Resolution::NoRemote | Resolution::KeepLocal => None,
        }
    }
}

/// The kind of a [`Resolution`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    /// No usable remote envelope.
    NoRemote,
    /// Remote adopted.
    AdoptRemote,
    /// Local kept.
    KeepLocal,
    /// Both sides merged.
    Merge,
}

impl ResolutionKind {
    /// Returns the snake_case name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::NoRemote => "no_remote",
            ResolutionKind::AdoptRemote => "adopt_remote",
            ResolutionKind::KeepLocal => "keep_local",
            ResolutionKind::Merge => "merge",
        }
    }
}

/// The two versions of one record that a pull has to reconcile.
///
/// Resolution is evaluated independently per record:
///
/// 1. No remote envelope (or one with a null payload): [`Resolution::NoRemote`].
/// 2. No local value (absent, null, or unparseable upstream): adopt remote.
/// 3. Remote `lastModified` strictly newer than the local index: adopt remote.
/// 4. Local index strictly newer than remote `lastModified`: keep local.
/// 5. Equal, or incomparable: merge by shape; if the shapes cannot be
///    merged, adopt remote.
///
/// A missing local index entry counts as the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conflict<'a> {
    /// Decoded local value.
    pub local: Option<&'a Value>,
    /// When the local value was last written through the engine.
    pub local_modified_at: Option<DateTime<Utc>>,
    /// The remote envelope.
    pub remote: Option<&'a RemoteEnvelope>,
}

impl<'a> Conflict<'a> {
    /// Creates a conflict between a local value and a remote envelope.
    pub fn new(
        local: Option<&'a Value>,
        local_modified_at: Option<DateTime<Utc>>,
        remote: Option<&'a RemoteEnvelope>,
    ) -> Self {
        Self {
            local,
            local_modified_at,
            remote,
        }
    }

    /// Resolves the conflict.
    pub fn resolve(&self) -> Resolution {
        let remote = match self.remote {
            Some(envelope) if envelope.has_data() => envelope,
            _ => return Resolution::NoRemote,
        };

        let local = match self.local {
            Some(value) if !value.is_null() => value,
            _ => return Resolution::AdoptRemote(remote.data.clone()),
        };

        let local_at = self.local_modified_at.unwrap_or_default();
        if let Some(remote_at) = remote.modified_at() {
            if remote_at > local_at {
                return Resolution::AdoptRemote(remote.data.clone());
            }
            if local_at > remote_at {
                return Resolution::KeepLocal;
            }
        }

        match merge::merge(local, &remote.data) {
            Some(merged) => Resolution::Merge(merged),
            None => Resolution::AdoptRemote(remote.data.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn envelope(data: serde_json::Value, at: DateTime<Utc>) -> RemoteEnvelope {
        RemoteEnvelope::wrap(v(data), at, "device_remote")
    }

    #[test]
    fn no_remote_envelope() {
        let local = v(json!(["a"]));
        let resolution = Conflict::new(Some(&local), Some(t0()), None).resolve();
        assert_eq!(resolution, Resolution::NoRemote);
        assert_eq!(resolution.new_local_value(), None);
    }

    #[test]
    fn null_remote_payload_counts_as_absent() {
        let local = v(json!(["a"]));
        let remote = envelope(json!(null), t0());
        let resolution = Conflict::new(Some(&local), None, Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::NoRemote);
    }

    #[test]
    fn no_local_adopts_remote() {
        let remote = envelope(json!(["a"]), t0());
        let resolution =
            Conflict::new(None, Some(t0() + Duration::days(1)), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::AdoptRemote(v(json!(["a"]))));

        let null = Value::null();
        let resolution = Conflict::new(Some(&null), None, Some(&remote)).resolve();
        assert_eq!(resolution.kind(), ResolutionKind::AdoptRemote);
    }

    #[test]
    fn newer_remote_wins() {
        let local = v(json!({"a": 1}));
        let remote = envelope(json!({"a": 2}), t0() + Duration::seconds(1));
        let resolution = Conflict::new(Some(&local), Some(t0()), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::AdoptRemote(v(json!({"a": 2}))));
    }

    #[test]
    fn missing_local_index_loses_to_dated_remote() {
        let local = v(json!({"a": 1}));
        let remote = envelope(json!({"a": 2}), t0());
        let resolution = Conflict::new(Some(&local), None, Some(&remote)).resolve();
        assert_eq!(resolution.kind(), ResolutionKind::AdoptRemote);
    }

    #[test]
    fn newer_local_is_kept_without_merging() {
        // Mergeable shapes, but timestamps decide first.
        let local = v(json!([{"id": 1}]));
        let remote = envelope(json!([{"id": 2}]), t0());
        let resolution = Conflict::new(
            Some(&local),
            Some(t0() + Duration::milliseconds(1)),
            Some(&remote),
        )
        .resolve();
        assert_eq!(resolution, Resolution::KeepLocal);
        assert_eq!(resolution.new_local_value(), None);
    }

    #[test]
    fn equal_timestamps_merge() {
        let local = v(json!([{"id": 1}, {"id": 2}]));
        let remote = envelope(json!([{"id": 2}, {"id": 3}]), t0());
        let resolution = Conflict::new(Some(&local), Some(t0()), Some(&remote)).resolve();
        assert_eq!(
            resolution,
            Resolution::Merge(v(json!([{"id": 1}, {"id": 2}, {"id": 3}])))
        );
    }

    #[test]
    fn incomparable_timestamps_merge() {
        let local = v(json!({"a": 1}));
        let mut remote = envelope(json!({"b": 2}), t0());
        remote.last_modified = "not a date".into();

        let resolution = Conflict::new(Some(&local), Some(t0()), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::Merge(v(json!({"a": 1, "b": 2}))));
    }

    #[test]
    fn shape_mismatch_on_tie_adopts_remote() {
        let local = v(json!(["a"]));
        let remote = envelope(json!({"a": true}), t0());
        let resolution = Conflict::new(Some(&local), Some(t0()), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::AdoptRemote(v(json!({"a": true}))));

        let local = v(json!(3));
        let remote = envelope(json!(4), t0());
        let resolution = Conflict::new(Some(&local), Some(t0()), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::AdoptRemote(v(json!(4))));
    }

    #[test]
    fn tie_after_timestamp_roundtrip() {
        let at = timestamp::parse("2024-06-01T12:00:00.500Z").unwrap();
        let local = v(json!({"x": 1}));
        let remote = envelope(json!({"x": 1}), at);
        let resolution = Conflict::new(Some(&local), Some(at), Some(&remote)).resolve();
        assert_eq!(resolution, Resolution::Merge(local.clone()));
    }

    #[test]
    fn kind_names() {
        assert_eq!(ResolutionKind::NoRemote.as_str(), "no_remote");
        assert_eq!(ResolutionKind::AdoptRemote.as_str(), "adopt_remote");
        assert_eq!(ResolutionKind::KeepLocal.as_str(), "keep_local");
        assert_eq!(ResolutionKind::Merge.as_str(), "merge");
    }
}
