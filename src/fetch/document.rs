//! Classification of fetched activity documents.

use crate::error::{Error, Result};
use serde_json::Value;

/// The activity streams JSON-LD context.
pub const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Media types that carry an activity document.
pub const ACTIVITY_MIME_TYPES: &[&str] = &["application/activity+json", "application/ld+json"];

/// Actor types accepted by the resolver.
pub const ACTOR_TYPES: &[&str] = &["Person", "Service", "Group", "Organization", "Application"];

/// Object types consumed by the status pipeline.
pub const OBJECT_TYPES: &[&str] = &[
    "Note", "Question", "Article", "Page", "Image", "Video", "Audio", "Event",
];

/// Activity type accepted only when the caller allows it.
pub const CREATE_TYPE: &str = "Create";

/// True if `value` is `needle`, or an array containing `needle`.
#[must_use]
pub fn equals_or_includes(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s == needle,
        Value::Array(items) => items.iter().any(|item| item.as_str() == Some(needle)),
        _ => false,
    }
}

/// True if `value` equals or includes any of `needles`.
#[must_use]
pub fn equals_or_includes_any(value: &Value, needles: &[&str]) -> bool {
    needles.iter().any(|needle| equals_or_includes(value, needle))
}

/// A string value, or the `id` of an embedded object.
#[must_use]
pub fn value_or_id(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("id").and_then(Value::as_str),
        _ => None,
    }
}

/// Whether the document declares the activity streams context.
#[must_use]
pub fn supported_context(json: &Value) -> bool {
    json.get("@context")
        .is_some_and(|ctx| equals_or_includes(ctx, ACTIVITYSTREAMS_CONTEXT))
}

/// Whether the document is an actor.
#[must_use]
pub fn is_actor(json: &Value) -> bool {
    json.get("type")
        .is_some_and(|t| equals_or_includes_any(t, ACTOR_TYPES))
}

/// Whether the document is a standalone public key with an owner reference.
#[must_use]
pub fn is_public_key(json: &Value) -> bool {
    let present = |field: &str| {
        json.get(field)
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
    };
    present("publicKeyPem") && present("owner")
}

/// Whether the document type is one the resolver hands to callers.
#[must_use]
pub fn expected_type(json: &Value, allow_create: bool) -> bool {
    if is_actor(json) || is_public_key(json) {
        return true;
    }
    let Some(kind) = json.get("type") else {
        return false;
    };
    equals_or_includes_any(kind, OBJECT_TYPES) || (allow_create && equals_or_includes(kind, CREATE_TYPE))
}

/// Whether a media type carries an activity document.
#[must_use]
pub fn is_activity_mime(mime: &str) -> bool {
    ACTIVITY_MIME_TYPES.contains(&mime)
}

/// Decode a response body as a JSON object.
///
/// # Errors
///
/// Returns `Error::Malformed` if the body is not a JSON object.
pub fn body_to_json(body: &[u8]) -> Result<Value> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::Malformed(format!("invalid JSON body: {e}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(Error::Malformed("JSON body is not an object".to_string()))
    }
}

/// Require a supported context, reporting the offending document id otherwise.
///
/// # Errors
///
/// Returns `Error::UnsupportedDocument` if the context is missing or foreign.
pub fn require_supported_context(json: &Value) -> Result<()> {
    if supported_context(json) {
        Ok(())
    } else {
        Err(Error::UnsupportedDocument(format!(
            "unsupported context for {}",
            json.get("id").and_then(Value::as_str).unwrap_or("<no id>")
        )))
    }
}
