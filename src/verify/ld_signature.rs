//! Embedded object signatures in the `RsaSignature2017` shape.
//!
//! An object carries its own signature:
//!
//! ```json
//! "signature": {
//!   "type": "SortedJsonRsaSignature",
//!   "creator": "https://a.example/users/alice#main-key",
//!   "created": "2024-05-01T12:00:00Z",
//!   "signatureValue": "base64..."
//! }
//! ```
//!
//! The signed bytes are `hex(sha256(options)) ++ hex(sha256(document))`, where
//! `options` is the signature object without `type`, `id` and
//! `signatureValue` plus the identity context, `document` is the object
//! without `signature`, and both are in canonical sorted-key form.
//!
//! Real `RsaSignature2017` signatures hash URDNA2015-normalized RDF rather
//! than sorted JSON, so they cannot be checked here. They are treated like
//! any other foreign suite: the document is reported as having no creator.

use super::CreatorVerifier;
use crate::canonical::to_canonical_bytes;
use crate::error::{Error, Result};
use crate::keys::KeyResolver;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Signature suite produced and understood here.
pub const SIGNATURE_TYPE: &str = "SortedJsonRsaSignature";

/// The RDF-normalized suite used by other servers, which is not verified.
pub const RDF_SIGNATURE_TYPE: &str = "RsaSignature2017";

/// Context merged into the signature options before hashing.
pub const IDENTITY_CONTEXT: &str = "https://w3id.org/identity/v1";

/// Verifies embedded object signatures against resolved creator keys.
#[derive(Clone)]
pub struct LinkedDataSignature {
    key_resolver: Arc<KeyResolver>,
}

impl LinkedDataSignature {
    /// Create a verifier resolving creators through `key_resolver`.
    #[must_use]
    pub fn new(key_resolver: Arc<KeyResolver>) -> Self {
        Self { key_resolver }
    }

    /// Sign `document` as `key_id`, returning a copy with `signature` set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if `document` is not a JSON object.
    pub fn sign(document: &Value, key_id: &str, private_key: &RsaPrivateKey, created: &str) -> Result<Value> {
        let Value::Object(fields) = document else {
            return Err(Error::Malformed("only JSON objects can be signed".to_string()));
        };

        let mut options = Map::new();
        options.insert("type".to_string(), Value::String(SIGNATURE_TYPE.to_string()));
        options.insert("creator".to_string(), Value::String(key_id.to_string()));
        options.insert("created".to_string(), Value::String(created.to_string()));

        let mut signed = fields.clone();
        signed.remove("signature");
        let payload = signed_bytes(&options, &signed);
        let signature = SigningKey::<Sha256>::new(private_key.clone()).sign(&payload);

        options.insert(
            "signatureValue".to_string(),
            Value::String(BASE64.encode(signature.to_vec())),
        );
        signed.insert("signature".to_string(), Value::Object(options));
        Ok(Value::Object(signed))
    }
}

/// The `signature` object, if it is one this module understands.
fn embedded_signature(document: &Value) -> Option<&Map<String, Value>> {
    let signature = document.get("signature")?.as_object()?;
    (signature.get("type").and_then(Value::as_str) == Some(SIGNATURE_TYPE)).then_some(signature)
}

fn hash_hex(value: &Value) -> String {
    hex::encode(Sha256::digest(to_canonical_bytes(value)))
}

/// Bytes covered by an object signature with `options` over `document`.
fn signed_bytes(options: &Map<String, Value>, document: &Map<String, Value>) -> Vec<u8> {
    let mut options = options.clone();
    for field in ["type", "id", "signatureValue"] {
        options.remove(field);
    }
    options.insert("@context".to_string(), Value::String(IDENTITY_CONTEXT.to_string()));

    let mut document = document.clone();
    document.remove("signature");

    let mut bytes = hash_hex(&Value::Object(options)).into_bytes();
    bytes.extend_from_slice(hash_hex(&Value::Object(document)).as_bytes());
    bytes
}

/// Check the embedded signature of `document` against `key`.
///
/// Returns `false` for a missing or foreign signature, an undecodable
/// signature value, or a signature that does not verify.
#[must_use]
pub fn verify_with_key(document: &Value, key: &RsaPublicKey) -> bool {
    let (Some(signature), Some(fields)) = (embedded_signature(document), document.as_object()) else {
        return false;
    };
    let Some(encoded) = signature.get("signatureValue").and_then(Value::as_str) else {
        return false;
    };
    let Ok(raw) = BASE64.decode(encoded.split_whitespace().collect::<String>()) else {
        return false;
    };
    let Ok(signature_bytes) = Signature::try_from(raw.as_slice()) else {
        return false;
    };

    VerifyingKey::<Sha256>::new(key.clone())
        .verify(&signed_bytes(signature, fields), &signature_bytes)
        .is_ok()
}

#[async_trait]
impl CreatorVerifier for LinkedDataSignature {
    async fn verify_creator(&self, document: &Value) -> Result<Option<String>> {
        let Some(signature) = embedded_signature(document) else {
            debug!("Document has no {SIGNATURE_TYPE} signature");
            return Ok(None);
        };
        let Some(creator) = signature.get("creator").and_then(Value::as_str) else {
            return Ok(None);
        };

        let Some(resolved) = self.key_resolver.resolve(creator).await? else {
            debug!("Signature creator {creator} could not be resolved");
            return Ok(None);
        };

        if verify_with_key(document, &resolved.public_key) {
            Ok(Some(resolved.owner))
        } else {
            debug!("Signature by {creator} does not verify");
            Ok(None)
        }
    }
}
