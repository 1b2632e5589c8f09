//! Public key material: verifier keys and remote creator keys.
//!
//! - [`VerifierKeyRegistry`] maps verifier URIs to the keys used for
//!   multi-party attestations, persisted to a JSON file.
//! - [`KeyResolver`] resolves the `creator` of an embedded object signature to
//!   its owning actor and public key.

mod registry;
mod remote;

pub use registry::{VerifierKeyRegistry, VerifierKeys};
pub use remote::{KeyCacheStats, KeyResolver, ResolvedKey};

use crate::error::{Error, Result};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

/// Parse a PEM public key, SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`).
///
/// # Errors
///
/// Returns `Error::KeyResolution` if neither encoding matches.
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::KeyResolution(format!("invalid public key PEM: {e}")))
}

/// Hex SHA-256 of the key's SPKI DER encoding.
///
/// # Errors
///
/// Returns `Error::KeyResolution` if the key cannot be encoded.
pub fn fingerprint(key: &RsaPublicKey) -> Result<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| Error::KeyResolution(format!("cannot encode public key: {e}")))?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}
