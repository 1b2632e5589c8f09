//! Configuration for fedfetch.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Accept header for negotiated fetches: activity document, then linked-data
/// document scoped to activity streams, then HTML as a low-weight fallback.
pub const ACCEPT_HEADER: &str = "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\", text/html;q=0.1";

/// Accept header for cache lookups. No HTML: a cache must answer with JSON.
pub const CACHE_ACCEPT_HEADER: &str =
    "application/activity+json, application/ld+json; profile=\"https://www.w3.org/ns/activitystreams\"";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Attestation trust settings.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Outbound fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Cache-serving endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Trust threshold and verifier key file.
///
/// Both values are required; they stay optional here so that their absence
/// can be reported as a configuration error instead of a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Minimum number of distinct verifier hosts required to trust a document.
    #[serde(default)]
    pub min_verifiers: Option<u32>,

    /// Path of the persisted verifier key file.
    #[serde(default)]
    pub verifiers_file: Option<PathBuf>,
}

/// Outbound fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum accepted response body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Accept header sent on negotiated fetches.
    #[serde(default = "default_accept")]
    pub accept: String,

    /// User agent for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Capacity of the resolved creator-key cache.
    #[serde(default = "default_key_cache_capacity")]
    pub key_cache_capacity: usize,
}

/// Cache-serving endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// JSON file mapping URIs to signed documents served from the cache.
    #[serde(default)]
    pub documents_file: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            accept: default_accept(),
            user_agent: default_user_agent(),
            key_cache_capacity: default_key_cache_capacity(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            documents_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_timeout_secs() -> u64 {
    20
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_accept() -> String {
    ACCEPT_HEADER.to_string()
}

fn default_user_agent() -> String {
    format!("fedfetch/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_key_cache_capacity() -> usize {
    1024
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Conventional location of the verifier key file, offered in configuration errors.
#[must_use]
pub fn suggested_verifiers_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "fedfetch")
        .map(|dirs| dirs.config_dir().join("verifiers.json"))
        .unwrap_or_else(|| PathBuf::from(".fedfetch/verifiers.json"))
}

impl TrustConfig {
    /// Validated trust threshold.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the threshold is absent or zero.
    pub fn min_verifiers(&self) -> Result<usize> {
        match self.min_verifiers {
            Some(0) => Err(Error::Config(
                "min_verifiers must be a positive integer".to_string(),
            )),
            Some(n) => usize::try_from(n)
                .map_err(|e| Error::Config(format!("min_verifiers out of range: {e}"))),
            None => Err(Error::Config("min_verifiers is not configured".to_string())),
        }
    }

    /// Validated verifier key file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no path is configured. No default is
    /// substituted; the message names the conventional location.
    pub fn verifiers_file(&self) -> Result<&Path> {
        self.verifiers_file.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "verifiers_file is not configured (conventionally {})",
                suggested_verifiers_file().display()
            ))
        })
    }
}

impl FetchConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ResolverConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
