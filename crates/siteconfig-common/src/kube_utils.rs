//! Small kube-rs helpers shared by the controllers

use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::Error;

/// Lookup of an owning object through metadata.ownerReferences
pub trait HasOwnerOfKind {
    /// Name of the first owner whose kind matches, if any
    ///
    /// Owner references with an empty name never match.
    fn owner_of_kind(&self, kind: &str) -> Option<&str>;
}

impl<K: Resource> HasOwnerOfKind for K {
    fn owner_of_kind(&self, kind: &str) -> Option<&str> {
        self.meta()
            .owner_references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|owner| owner.kind == kind && !owner.name.is_empty())
            .map(|owner| owner.name.as_str())
    }
}

/// `namespace/name` of a resource, for log fields and error messages
pub fn object_key<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{}/{}", ns, obj.name_any()),
        None => obj.name_any(),
    }
}

/// Compute a top-level JSON merge patch between two serializable values
///
/// Fields whose serialized value changed (or appeared) carry the new value;
/// fields that disappeared are set to `null`. Returns `None` when nothing
/// changed. Lists are compared whole, matching merge-patch semantics where a
/// list in the patch replaces the stored list.
pub fn merge_patch_diff<T: Serialize>(before: &T, after: &T) -> Result<Option<Value>, Error> {
    let before = as_object(serde_json::to_value(before)?)?;
    let after = as_object(serde_json::to_value(after)?)?;

    let mut patch = Map::new();
    for (key, value) in &after {
        if before.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    if patch.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Value::Object(patch)))
    }
}

fn as_object(value: Value) -> Result<Map<String, Value>, Error> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(Error::internal_with_context(
            "merge-patch",
            format!("expected an object, got {}", other),
        )),
    }
}
