//! Verifier key registry.
//!
//! The registry file is a pretty-printed JSON object mapping each verifier URI
//! to a PEM public key, or `null` while the key is still unknown:
//!
//! ```json
//! {
//!   "https://verifier.example/actor": null,
//!   "https://other.example/actor": "-----BEGIN PUBLIC KEY-----\n..."
//! }
//! ```
//!
//! The first call to [`VerifierKeyRegistry::get_keys`] loads the file, fetches
//! the profile of every `null` entry, writes the file back and caches the
//! result for the lifetime of the registry (or until [`invalidate`]).
//!
//! [`invalidate`]: VerifierKeyRegistry::invalidate

use super::{fingerprint, parse_public_key};
use crate::config::TrustConfig;
use crate::error::{Error, Result};
use crate::fetch::{fetch_json, Transport};
use rsa::RsaPublicKey;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Persisted form: verifier URI to PEM (or `null`).
type KeyFile = BTreeMap<String, Option<String>>;

/// Verification-ready verifier keys.
#[derive(Debug, Clone, Default)]
pub struct VerifierKeys {
    entries: BTreeMap<String, Option<RsaPublicKey>>,
}

impl VerifierKeys {
    /// Build from `(uri, key)` pairs. An earlier resolved key is never
    /// replaced by a later entry for the same URI.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Option<RsaPublicKey>)>) -> Self {
        let mut map: BTreeMap<String, Option<RsaPublicKey>> = BTreeMap::new();
        for (uri, key) in entries {
            let slot = map.entry(uri).or_default();
            if slot.is_none() {
                *slot = key;
            }
        }
        Self { entries: map }
    }

    /// Key for `uri`, if known and resolved.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&RsaPublicKey> {
        self.entries.get(uri).and_then(Option::as_ref)
    }

    /// Whether `uri` is listed, resolved or not.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    /// Number of listed verifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no verifier is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of verifiers with a usable key.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|key| key.is_some()).count()
    }

    /// Listed verifiers still without a usable key.
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, key)| key.is_none())
            .map(|(uri, _)| uri.as_str())
    }

    /// All entries in URI order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&RsaPublicKey>)> {
        self.entries.iter().map(|(uri, key)| (uri.as_str(), key.as_ref()))
    }
}

/// Owns the verifier key file and the in-memory key map.
pub struct VerifierKeyRegistry {
    path: PathBuf,
    min_verifiers: usize,
    transport: Arc<dyn Transport>,
    accept: String,
    keys: Mutex<Option<Arc<VerifierKeys>>>,
}

impl VerifierKeyRegistry {
    /// Create a registry from trust configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the threshold or key file path is missing or invalid.
    pub fn new(config: &TrustConfig, transport: Arc<dyn Transport>, accept: impl Into<String>) -> Result<Self> {
        Ok(Self {
            path: config.verifiers_file()?.to_path_buf(),
            min_verifiers: config.min_verifiers()?,
            transport,
            accept: accept.into(),
            keys: Mutex::new(None),
        })
    }

    /// Configured trust threshold.
    #[must_use]
    pub fn min_verifiers(&self) -> usize {
        self.min_verifiers
    }

    /// Path of the key file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current keys, populating the registry on first use.
    ///
    /// Concurrent callers wait for a single population pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be written back.
    pub async fn get_keys(&self) -> Result<Arc<VerifierKeys>> {
        let mut guard = self.keys.lock().await;
        if let Some(keys) = guard.as_ref() {
            return Ok(Arc::clone(keys));
        }

        let keys = Arc::new(self.populate().await?);
        *guard = Some(Arc::clone(&keys));
        Ok(keys)
    }

    /// Drop the cached keys; the next [`get_keys`](Self::get_keys) repopulates.
    pub async fn invalidate(&self) {
        *self.keys.lock().await = None;
        debug!("Verifier keys invalidated");
    }

    /// Invalidate and repopulate immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be written back.
    pub async fn refresh(&self) -> Result<Arc<VerifierKeys>> {
        self.invalidate().await;
        self.get_keys().await
    }

    async fn populate(&self) -> Result<VerifierKeys> {
        let mut file = self.load().await;

        for (uri, pem) in &mut file {
            if pem.is_some() {
                continue;
            }
            match self.fetch_verifier_key(uri).await {
                Ok(fetched) => {
                    info!("Resolved verifier key for {uri}");
                    *pem = Some(fetched);
                }
                Err(e) => warn!("Could not resolve verifier key for {uri}: {e}"),
            }
        }

        self.persist(&file).await?;

        let keys = VerifierKeys::from_entries(file.into_iter().map(|(uri, pem)| {
            let key = pem.and_then(|pem| match parse_public_key(&pem) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!("Skipping malformed verifier key for {uri}: {e}");
                    None
                }
            });
            (uri, key)
        }));

        for (uri, key) in keys.iter() {
            if let Some(print) = key.and_then(|k| fingerprint(k).ok()) {
                debug!("Verifier {uri} key {print}");
            }
        }
        info!(
            "Loaded {} verifier key(s), {} unresolved",
            keys.resolved_count(),
            keys.len() - keys.resolved_count()
        );
        Ok(keys)
    }

    async fn load(&self) -> KeyFile {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read verifier keys from {}: {e}", self.path.display());
                return KeyFile::new();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Could not parse verifier keys in {}: {e}", self.path.display());
            KeyFile::new()
        })
    }

    async fn fetch_verifier_key(&self, uri: &str) -> Result<String> {
        let profile = fetch_json(self.transport.as_ref(), uri, &self.accept).await?;
        profile
            .get("publicKey")
            .and_then(|key| key.get("publicKeyPem"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::KeyResolution(format!("{uri} has no publicKey.publicKeyPem")))
    }

    async fn persist(&self, file: &KeyFile) -> Result<()> {
        let mut content = serde_json::to_string_pretty(file)?;
        content.push('\n');
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes()))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

/// Write `content` to a sibling temp file, then rename it over `path`.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
