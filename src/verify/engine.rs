//! Multi-party threshold verification of attested documents.

use super::attestation::{LookupData, SignatureAttestation};
use crate::canonical;
use crate::error::{Error, Result};
use crate::keys::{VerifierKeyRegistry, VerifierKeys};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Outcome of a successful verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustResult {
    /// Distinct hosts whose signers produced a valid signature.
    pub verified_hosts: BTreeSet<String>,
    /// Threshold the result was judged against.
    pub min_verifiers: usize,
}

impl TrustResult {
    /// Whether enough distinct hosts vouched for the document.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.verified_hosts.len() >= self.min_verifiers
    }
}

/// Lowercased, IDNA-normalized host of `uri`.
#[must_use]
pub fn normalize_host(uri: &str) -> Option<String> {
    let parsed = Url::parse(uri).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.');
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

fn signature_valid(key: &RsaPublicKey, signature: &[u8], payload: &[u8]) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(key.clone())
        .verify(payload, &signature)
        .is_ok()
}

/// Check `attestations` against `keys`, in order.
///
/// Attestations from signers without a known key are skipped. The first
/// known signer whose signature does not verify fails the whole call.
///
/// # Errors
///
/// Returns `Error::Verification` on the first bad signature from a known signer.
pub fn verify_with_keys(
    keys: &VerifierKeys,
    min_verifiers: usize,
    document: &Value,
    auxiliary: Option<&Map<String, Value>>,
    attestations: &[SignatureAttestation],
) -> Result<TrustResult> {
    let mut verified_hosts = BTreeSet::new();

    for attestation in attestations {
        let Some(key) = keys.get(&attestation.signed_by) else {
            debug!("Skipping attestation from unknown signer {}", attestation.signed_by);
            continue;
        };

        let payload = canonical::build(document, auxiliary, &attestation.signature_time);
        if !signature_valid(key, &attestation.signature, &payload) {
            warn!("Invalid signature from known signer {}", attestation.signed_by);
            return Err(Error::Verification(format!(
                "invalid signature from {}",
                attestation.signed_by
            )));
        }

        match normalize_host(&attestation.signed_by) {
            Some(host) => {
                verified_hosts.insert(host);
            }
            None => warn!("Signer {} has no host; not counted", attestation.signed_by),
        }
    }

    Ok(TrustResult {
        verified_hosts,
        min_verifiers,
    })
}

/// Verifies attested documents against the verifier key registry.
#[derive(Clone)]
pub struct SignatureVerifier {
    registry: Arc<VerifierKeyRegistry>,
}

impl SignatureVerifier {
    /// Create a verifier backed by `registry`.
    #[must_use]
    pub fn new(registry: Arc<VerifierKeyRegistry>) -> Self {
        Self { registry }
    }

    /// The key registry in use.
    #[must_use]
    pub fn registry(&self) -> &Arc<VerifierKeyRegistry> {
        &self.registry
    }

    /// Verify `attestations` over `document` and `auxiliary`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Verification` if a known signer's signature is bad, or
    /// the registry's error if keys cannot be loaded.
    pub async fn verify(
        &self,
        document: &Value,
        auxiliary: Option<&Map<String, Value>>,
        attestations: &[SignatureAttestation],
    ) -> Result<TrustResult> {
        let keys = self.registry.get_keys().await?;
        let result = verify_with_keys(
            &keys,
            self.registry.min_verifiers(),
            document,
            auxiliary,
            attestations,
        )?;
        debug!(
            "Verified {} host(s) of {} required",
            result.verified_hosts.len(),
            result.min_verifiers
        );
        Ok(result)
    }

    /// Verify a lookup bundle and return its document if trusted.
    ///
    /// A missing signature list or an untrusted result is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` for undecodable bundles and
    /// `Error::Verification` for forged signatures.
    pub async fn verify_lookup(&self, data: &LookupData) -> Result<Option<Value>> {
        let Some(attestations) = data.attestations()? else {
            return Ok(None);
        };
        let document = data.document()?;
        if !document.is_object() {
            return Ok(None);
        }

        let result = self
            .verify(&document, data.auxiliary.as_ref(), &attestations)
            .await?;
        Ok(result.is_trusted().then_some(document))
    }
}
