//! Negotiated resource fetcher with one-hop discovery and cache fallback.

use super::discovery;
use super::document::{body_to_json, expected_type, is_activity_mime, require_supported_context};
use super::transport::{HttpResponse, Transport};
use super::{FetchOutcome, FetchSource, Resolution};
use crate::config::{ACCEPT_HEADER, CACHE_ACCEPT_HEADER};
use crate::error::Result;
use crate::verify::CreatorVerifier;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolution statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    /// Documents accepted from the origin.
    pub origin_hits: u64,
    /// Documents accepted from a cache host.
    pub cache_hits: u64,
    /// Resolutions that ended with nothing and no error.
    pub misses: u64,
    /// Direct-path failures (transport, timeout, oversized or malformed body).
    pub failures: u64,
    /// Cache bundles fetched but rejected.
    pub cache_rejections: u64,
}

/// How a single fetch attempt may behave.
#[derive(Debug, Clone, Copy)]
pub(super) struct FetchMode<'a> {
    /// No further discovery hops allowed.
    pub terminal: bool,
    /// Accept `Create` activities.
    pub allow_create: bool,
    /// Accept header to send.
    pub accept: &'a str,
}

impl<'a> FetchMode<'a> {
    fn direct(accept: &'a str) -> Self {
        Self {
            terminal: false,
            allow_create: false,
            accept,
        }
    }

    pub(super) fn cache() -> Self {
        Self {
            terminal: true,
            allow_create: true,
            accept: CACHE_ACCEPT_HEADER,
        }
    }
}

/// What to do after looking at one response.
enum Step {
    Accept(FetchOutcome),
    Follow(String),
    Miss,
}

/// Resolves URIs to activity documents.
///
/// Safe to share between tasks; each call keeps its own state.
pub struct ResourceFetcher {
    pub(super) transport: Arc<dyn Transport>,
    pub(super) creator_verifier: Arc<dyn CreatorVerifier>,
    accept: String,
    pub(super) stats: RwLock<FetchStats>,
}

impl ResourceFetcher {
    /// Create a fetcher using the default Accept header.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, creator_verifier: Arc<dyn CreatorVerifier>) -> Self {
        Self::with_accept(transport, creator_verifier, ACCEPT_HEADER)
    }

    /// Create a fetcher with an explicit Accept header.
    #[must_use]
    pub fn with_accept(
        transport: Arc<dyn Transport>,
        creator_verifier: Arc<dyn CreatorVerifier>,
        accept: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            creator_verifier,
            accept: accept.into(),
            stats: RwLock::new(FetchStats::default()),
        }
    }

    /// Resolve `uri` to an accepted document.
    ///
    /// Returns `Ok(None)` when nothing acceptable was found. A direct-path
    /// failure is returned only when the cache fallback could not stand in.
    ///
    /// # Errors
    ///
    /// Returns the original direct-path failure if no cache result replaced it.
    pub async fn resolve(&self, uri: &str, possible_cache: Option<&str>) -> Result<Option<FetchOutcome>> {
        Ok(self.resolve_detailed(uri, possible_cache).await?.outcome)
    }

    /// Like [`resolve`](Self::resolve), also reporting the last non-200 status.
    ///
    /// # Errors
    ///
    /// Returns the original direct-path failure if no cache result replaced it.
    pub async fn resolve_detailed(&self, uri: &str, possible_cache: Option<&str>) -> Result<Resolution> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Ok(Resolution::default());
        }

        let mut last_status = None;
        let failure = match self
            .process(uri, FetchMode::direct(&self.accept), &mut last_status)
            .await
        {
            Ok(Some(outcome)) => {
                self.stats.write().origin_hits += 1;
                return Ok(Resolution {
                    outcome: Some(outcome),
                    last_status,
                });
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Error fetching resource {uri}: {e}");
                self.stats.write().failures += 1;
                Some(e)
            }
        };

        let cached = match possible_cache {
            Some(cache_host) => self.fetch_from_cache(cache_host, uri).await,
            None => None,
        };

        match (cached, failure) {
            (Some(outcome), failure) => {
                if let Some(e) = failure {
                    warn!("Resolved {uri} from cache after origin failure: {e}");
                }
                self.stats.write().cache_hits += 1;
                Ok(Resolution {
                    outcome: Some(outcome),
                    last_status,
                })
            }
            (None, Some(e)) => Err(e),
            (None, None) => {
                self.stats.write().misses += 1;
                Ok(Resolution {
                    outcome: None,
                    last_status,
                })
            }
        }
    }

    /// Fetch `url`, following at most one discovery hop unless `mode` is terminal.
    pub(super) async fn process(
        &self,
        url: &str,
        mode: FetchMode<'_>,
        last_status: &mut Option<u16>,
    ) -> Result<Option<FetchOutcome>> {
        let mut target = url.to_string();
        let mut terminal = mode.terminal;

        loop {
            let response = self.transport.get(&target, mode.accept).await?;
            match Self::process_response(&response, terminal, mode.allow_create, last_status)? {
                Step::Accept(outcome) => return Ok(Some(outcome)),
                Step::Miss => return Ok(None),
                Step::Follow(next) => {
                    debug!("Following alternate link {target} -> {next}");
                    target = next;
                    terminal = true;
                }
            }
        }
    }

    fn process_response(
        response: &HttpResponse,
        terminal: bool,
        allow_create: bool,
        last_status: &mut Option<u16>,
    ) -> Result<Step> {
        if !response.is_ok() {
            *last_status = Some(response.status);
            return Ok(Step::Miss);
        }

        let mime = response.mime_type().unwrap_or_default();
        if is_activity_mime(&mime) {
            let json = body_to_json(&response.body)?;
            if let Err(e) = require_supported_context(&json) {
                debug!("{e} at {}", response.url);
                return Ok(Step::Miss);
            }
            if !expected_type(&json, allow_create) {
                debug!("Unexpected document type at {}", response.url);
                return Ok(Step::Miss);
            }
            let Some(id) = json.get("id").and_then(Value::as_str) else {
                debug!("Document at {} has no id", response.url);
                return Ok(Step::Miss);
            };
            let mut auxiliary = Map::new();
            auxiliary.insert("id_verified".to_string(), Value::Bool(true));
            return Ok(Step::Accept(FetchOutcome {
                resolved_uri: id.to_string(),
                body: response.body.clone(),
                content_is_prefetched: true,
                auxiliary: Some(auxiliary),
                source: FetchSource::Origin,
            }));
        }

        if terminal {
            return Ok(Step::Miss);
        }

        let links = response
            .link
            .as_deref()
            .map(discovery::parse_link_header)
            .unwrap_or_default();

        let next = if discovery::has_alternate(&links) {
            discovery::alternate_from_links(&links, &response.url)
        } else if mime == "text/html" {
            discovery::alternate_from_html(&String::from_utf8_lossy(&response.body), &response.url)
        } else {
            None
        };

        Ok(next.map_or(Step::Miss, Step::Follow))
    }

    /// Get current statistics.
    #[must_use]
    pub fn stats(&self) -> FetchStats {
        self.stats.read().clone()
    }

    /// Reset statistics.
    pub fn reset_stats(&self) {
        *self.stats.write() = FetchStats::default();
    }
}
