//! Attestations and the lookup bundles that carry them.

use crate::canonical;
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{SecondsFormat, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

/// One signer's claim that a document's canonical payload is authentic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureAttestation {
    /// Signer URI (its key is looked up in the verifier registry).
    pub signed_by: String,
    /// Raw signature bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Time the signer claims to have signed, as sent.
    pub signature_time: String,
}

/// A document plus the attestations gathered for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupData {
    /// The document, as a JSON string.
    pub json: String,
    /// Attestations. Anything other than an array means "none".
    #[serde(default)]
    pub key_signatures: Option<Value>,
    /// Data the signers saw alongside the document.
    #[serde(default)]
    pub auxiliary: Option<Map<String, Value>>,
}

impl LookupData {
    /// Decoded attestations, or `None` if the list is missing or not an array.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if an entry cannot be decoded.
    pub fn attestations(&self) -> Result<Option<Vec<SignatureAttestation>>> {
        match &self.key_signatures {
            Some(list @ Value::Array(_)) => serde_json::from_value(list.clone())
                .map(Some)
                .map_err(|e| Error::Malformed(format!("invalid key signature: {e}"))),
            _ => Ok(None),
        }
    }

    /// The document, parsed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if `json` is not valid JSON.
    pub fn document(&self) -> Result<Value> {
        serde_json::from_str(&self.json).map_err(|e| Error::Malformed(format!("invalid lookup json: {e}")))
    }
}

/// Produces attestations as a verifier node.
pub struct Attestor {
    signer_uri: String,
    signing_key: SigningKey<Sha256>,
}

impl Attestor {
    /// Create an attestor for `signer_uri`.
    #[must_use]
    pub fn new(signer_uri: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            signer_uri: signer_uri.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
        }
    }

    /// Create an attestor from a PKCS#8 PEM private key.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyResolution` if the PEM cannot be decoded.
    pub fn from_pkcs8_pem(signer_uri: impl Into<String>, pem: &str) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| Error::KeyResolution(format!("invalid private key: {e}")))?;
        Ok(Self::new(signer_uri, key))
    }

    /// Signer URI.
    #[must_use]
    pub fn signer_uri(&self) -> &str {
        &self.signer_uri
    }

    /// Attest `document` as of now.
    #[must_use]
    pub fn attest(&self, document: &Value, auxiliary: Option<&Map<String, Value>>) -> SignatureAttestation {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.attest_at(document, auxiliary, &now)
    }

    /// Attest `document` with an explicit signature time.
    #[must_use]
    pub fn attest_at(
        &self,
        document: &Value,
        auxiliary: Option<&Map<String, Value>>,
        signature_time: &str,
    ) -> SignatureAttestation {
        let payload = canonical::build(document, auxiliary, signature_time);
        let signature = self.signing_key.sign(&payload);
        SignatureAttestation {
            signed_by: self.signer_uri.clone(),
            signature: signature.to_vec(),
            signature_time: signature_time.to_string(),
        }
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        // Signers may wrap base64 across lines.
        let compact: String = encoded.split_whitespace().collect();
        BASE64.decode(compact).map_err(serde::de::Error::custom)
    }
}
