//! Canonical signing payloads.
//!
//! Signers and verifiers agree on the exact bytes a signature covers by
//! projecting a fixed set of actor fields out of the subject document and
//! serializing the result with every mapping sorted by key.

use serde_json::{Map, Value};

/// Actor fields projected into the signing payload, in no particular order.
pub const ACTOR_FIELDS: &[&str] = &[
    "id",
    "uri",
    "type",
    "following",
    "followers",
    "inbox",
    "outbox",
    "name",
    "url",
    "published",
    "endpoints",
];

/// Build the canonical payload for `document` as attested at `signature_time`.
///
/// Absent (or `null`) fields become an empty mapping so that a missing field
/// can never be confused with a present one. `auxiliary` carries data the
/// signer saw alongside the document, e.g. a webfinger-derived identity.
#[must_use]
pub fn build(document: &Value, auxiliary: Option<&Map<String, Value>>, signature_time: &str) -> Vec<u8> {
    let mut actor = Map::new();
    for field in ACTOR_FIELDS {
        actor.insert((*field).to_string(), field_or_empty(document, field));
    }

    let mut payload = Map::new();
    payload.insert("actor".to_string(), Value::Object(actor));
    payload.insert(
        "auxiliary".to_string(),
        Value::Object(auxiliary.cloned().unwrap_or_default()),
    );
    payload.insert("key".to_string(), field_or_empty(document, "publicKey"));
    payload.insert(
        "signature_time".to_string(),
        Value::String(signature_time.to_string()),
    );

    to_canonical_bytes(&Value::Object(payload))
}

/// Serialize `value` with all mapping keys sorted, recursively.
#[must_use]
pub fn to_canonical_bytes(value: &Value) -> Vec<u8> {
    // Serializing a `Value` cannot fail: keys are always strings.
    serde_json::to_vec(&sort_keys(value)).unwrap_or_default()
}

/// Return a copy of `value` whose mappings are sorted by key at every depth.
/// Sequence order is preserved.
#[must_use]
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), sort_keys(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn field_or_empty(document: &Value, field: &str) -> Value {
    match document.get(field) {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value) => value.clone(),
    }
}
