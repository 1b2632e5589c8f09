//! Signature verification.
//!
//! Two independent checks live here:
//!
//! - [`SignatureVerifier`] decides whether enough distinct verifier hosts
//!   attested to a document (multi-party threshold).
//! - [`LinkedDataSignature`] proves that a single object was signed by the
//!   actor it names, which is what the cache fallback relies on.

mod attestation;
mod engine;
mod ld_signature;

pub use attestation::{Attestor, LookupData, SignatureAttestation};
pub use engine::{normalize_host, SignatureVerifier, TrustResult};
pub use ld_signature::{LinkedDataSignature, IDENTITY_CONTEXT, RDF_SIGNATURE_TYPE, SIGNATURE_TYPE};

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Verifies an object signature embedded in a document.
#[async_trait]
pub trait CreatorVerifier: Send + Sync {
    /// Return the URI of the actor whose key produced the embedded signature,
    /// or `None` if there is no valid signature.
    async fn verify_creator(&self, document: &Value) -> Result<Option<String>>;
}
