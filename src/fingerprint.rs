//! Request fingerprinting.
//!
//! The fingerprint is a SHA-256 digest over a canonical serialization of the
//! semantically relevant request fields. Canonical means every object's keys
//! are sorted recursively before hashing, so two logically identical requests
//! built with different field-insertion orders share one cache entry. Custom
//! adapters contribute their stable id, never a function reference.

use crate::types::{ModelChoice, OutputSpec, RequestSpec};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Compute the cache fingerprint of a normalized request.
pub fn fingerprint(spec: &RequestSpec) -> String {
    let mut parts: BTreeMap<&'static str, Value> = BTreeMap::new();

    parts.insert("task", Value::String(spec.task.clone()));
    if let Some(ref role) = spec.role {
        parts.insert("role", Value::String(role.clone()));
    }
    parts.insert("inputs", canonicalize(&Value::Object(spec.inputs.clone())));

    match &spec.outputs {
        OutputSpec::Descriptor(d) => {
            parts.insert("outputs", canonicalize(d));
        }
        OutputSpec::Schema(s) => {
            parts.insert("outputs", canonicalize(s));
        }
        OutputSpec::Text => {}
    }

    parts.insert(
        "output_format",
        Value::String(spec.output_format.as_str().to_string()),
    );
    parts.insert("provider", Value::String(spec.provider.fingerprint_id()));

    match &spec.model {
        ModelChoice::Unspecified => {}
        ModelChoice::Single(m) => {
            parts.insert("model", Value::String(m.clone()));
        }
        ModelChoice::Ordered(ms) => {
            parts.insert(
                "model",
                Value::Array(ms.iter().map(|m| Value::String(m.clone())).collect()),
            );
        }
    }

    // Fixed precision keeps float formatting out of the key.
    parts.insert("temperature", Value::String(format!("{:.4}", spec.temperature)));
    parts.insert("local_only", Value::Bool(spec.local_only));
    parts.insert("best_model", Value::Bool(spec.best_model));
    parts.insert("include_metadata", Value::Bool(spec.include_metadata));

    let canonical = serde_json::to_string(&parts).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Recursively sort object keys.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::with_capacity(map.len());
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
