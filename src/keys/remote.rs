//! Resolution of signature creators to their owning actor and key.
//!
//! A `creator` is usually a key id such as `https://a.example/users/alice#main-key`.
//! Fetching it yields either the actor (with an embedded `publicKey`) or a
//! standalone key document whose `owner` must confirm the key back.

use super::parse_public_key;
use crate::error::{Error, Result};
use crate::fetch::document::{is_actor, is_public_key, supported_context, value_or_id};
use crate::fetch::{fetch_json, Transport};
use lru::LruCache;
use parking_lot::Mutex;
use rsa::RsaPublicKey;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Default cache capacity.
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// A creator key and the actor that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    /// The key id that was resolved.
    pub key_id: String,
    /// URI of the owning actor.
    pub owner: String,
    /// The key itself.
    pub public_key: RsaPublicKey,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct KeyCacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
}

impl KeyCacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Resolves and caches creator keys.
#[derive(Clone)]
pub struct KeyResolver {
    transport: Arc<dyn Transport>,
    accept: String,
    cache: Arc<Mutex<LruCache<String, ResolvedKey>>>,
    stats: Arc<Mutex<KeyCacheStats>>,
}

impl KeyResolver {
    /// Create a resolver with the default cache capacity.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, accept: impl Into<String>) -> Self {
        Self::with_capacity(transport, accept, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a resolver with the given cache capacity (at least one entry).
    #[must_use]
    pub fn with_capacity(transport: Arc<dyn Transport>, accept: impl Into<String>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            transport,
            accept: accept.into(),
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(KeyCacheStats::default())),
        }
    }

    /// Resolve `key_id` to its owner and public key.
    ///
    /// Returns `Ok(None)` when the fetched document is neither an actor with
    /// that key nor a key document confirmed by its owner.
    ///
    /// # Errors
    ///
    /// Returns transport errors from fetching, and `Error::KeyResolution` when
    /// the key material cannot be parsed.
    pub async fn resolve(&self, key_id: &str) -> Result<Option<ResolvedKey>> {
        if let Some(hit) = self.cached(key_id) {
            return Ok(Some(hit));
        }

        let json = fetch_json(self.transport.as_ref(), &without_fragment(key_id), &self.accept).await?;

        let resolved = if !supported_context(&json) {
            warn!("Document at {key_id} lacks the activity streams context");
            None
        } else if is_actor(&json) {
            Self::actor_key(key_id, &json)?
        } else if is_public_key(&json) {
            self.confirmed_key(key_id, &json).await?
        } else {
            debug!("Document at {key_id} is neither an actor nor a key");
            None
        };

        if let Some(resolved) = &resolved {
            self.cache.lock().put(key_id.to_string(), resolved.clone());
            self.stats.lock().additions += 1;
        }
        Ok(resolved)
    }

    fn cached(&self, key_id: &str) -> Option<ResolvedKey> {
        let hit = self.cache.lock().get(key_id).cloned();
        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    fn actor_key(key_id: &str, actor: &Value) -> Result<Option<ResolvedKey>> {
        let Some(owner) = actor.get("id").and_then(Value::as_str) else {
            return Ok(None);
        };
        let Some(key) = actor.get("publicKey") else {
            return Ok(None);
        };
        // The creator may name the actor itself or its embedded key.
        let embedded_id = value_or_id(key);
        if key_id != owner && embedded_id != Some(key_id) {
            warn!("Actor {owner} does not carry key {key_id}");
            return Ok(None);
        }
        let Some(pem) = key.get("publicKeyPem").and_then(Value::as_str) else {
            return Ok(None);
        };

        Ok(Some(ResolvedKey {
            key_id: key_id.to_string(),
            owner: owner.to_string(),
            public_key: parse_public_key(pem)?,
        }))
    }

    async fn confirmed_key(&self, key_id: &str, key: &Value) -> Result<Option<ResolvedKey>> {
        if key.get("id").and_then(Value::as_str) != Some(key_id) {
            warn!("Key document at {key_id} declares a different id");
            return Ok(None);
        }
        let Some(owner) = key.get("owner").and_then(value_or_id) else {
            return Ok(None);
        };

        let owner_json = fetch_json(self.transport.as_ref(), owner, &self.accept).await?;
        let confirmed = supported_context(&owner_json)
            && is_actor(&owner_json)
            && owner_json.get("id").and_then(Value::as_str) == Some(owner)
            && owner_json.get("publicKey").and_then(value_or_id) == Some(key_id);
        if !confirmed {
            warn!("Owner {owner} does not confirm key {key_id}");
            return Ok(None);
        }

        let pem = key
            .get("publicKeyPem")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::KeyResolution(format!("{key_id} has no publicKeyPem")))?;

        Ok(Some(ResolvedKey {
            key_id: key_id.to_string(),
            owner: owner.to_string(),
            public_key: parse_public_key(pem)?,
        }))
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> KeyCacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Forget every cached key.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

fn without_fragment(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => uri.to_string(),
    }
}
