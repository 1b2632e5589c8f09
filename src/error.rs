//! Error types for fedfetch.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving or verifying federated resources.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Verifier or creator key material could not be turned into a usable key.
    #[error("Key resolution error: {0}")]
    KeyResolution(String),

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its deadline.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body exceeded the configured ceiling.
    #[error("Response body from {url} exceeds {limit} bytes")]
    BodyTooLarge {
        /// URL being fetched.
        url: String,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// Document has the wrong context or type.
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// A known signer produced a signature that does not verify.
    #[error("Signature verification failed: {0}")]
    Verification(String),

    /// Body or payload could not be decoded.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true for failures of the network path (transport, timeout, oversized body).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::BodyTooLarge { .. }
        )
    }
}
