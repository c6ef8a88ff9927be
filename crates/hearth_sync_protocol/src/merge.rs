//! Merge strategies for combining two versions of a record.
//!
//! Two policies, picked by value shape:
//!
//! - **List union** ([`union_lists`]): every local element in order, then each
//!   remote element whose identity is not already present.
//! - **Structural merge** ([`merge_maps`]): start from the remote map and
//!   overlay the local map recursively. Local scalars win; nested maps merge;
//!   nested lists use list union with the local side as the base.
//!
//! Any other pairing of shapes cannot be merged and [`merge`] returns `None`;
//! callers adopt the remote value wholesale in that case.

use crate::value::Value;
use std::collections::{BTreeMap, HashSet};

/// Identity of a list element for union purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementIdentity {
    /// The canonical JSON of a map element's non-null `id` field.
    Id(String),
    /// The canonical JSON of the whole element.
    Content(String),
}

/// Computes the identity of a list element.
pub fn element_identity(element: &Value) -> ElementIdentity {
    match element.get("id") {
        Some(id) if !id.is_null() => ElementIdentity::Id(id.canonical_json()),
        _ => ElementIdentity::Content(element.canonical_json()),
    }
}

/// Ordered union of two lists by element identity.
///
/// The result starts with all of `local` unchanged, followed by the elements
/// of `remote` whose identity has not been seen yet. Nothing is removed.
/// Membership of the result does not depend on argument order.
pub fn union_lists(local: &[Value], remote: &[Value]) -> Vec<Value> {
    let mut seen: HashSet<ElementIdentity> = local.iter().map(element_identity).collect();
    let mut merged = local.to_vec();

    for item in remote {
        if seen.insert(element_identity(item)) {
            merged.push(item.clone());
        }
    }

    merged
}

/// Recursive structural merge of two maps, biased toward local scalars.
pub fn merge_maps(
    local: &BTreeMap<String, Value>,
    remote: &BTreeMap<String, Value>,
) -> BTreeMap<String, Value> {
    let mut merged = remote.clone();

    for (key, local_value) in local {
        let value = match (local_value, remote.get(key)) {
            (Value::Map(l), Some(Value::Map(r))) => Value::Map(merge_maps(l, r)),
            (Value::List(l), Some(Value::List(r))) => Value::List(union_lists(l, r)),
            _ => local_value.clone(),
        };
        merged.insert(key.clone(), value);
    }

    merged
}

/// Merges two values by shape.
///
/// Returns `None` when the shapes cannot be merged (list against map, or
/// either side a bare scalar).
pub fn merge(local: &Value, remote: &Value) -> Option<Value> {
    match (local, remote) {
        (Value::List(l), Value::List(r)) => Some(Value::List(union_lists(l, r))),
        (Value::Map(l), Value::Map(r)) => Some(Value::Map(merge_maps(l, r))),
        _ => None,
    }
}
