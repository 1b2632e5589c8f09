//! Cache-host fallback for unreachable origins.
//!
//! A cache host serves previously fetched, signed copies of documents at
//! `{site}/get_from_cache/{uri}`. Nothing it returns is trusted until the
//! embedded object signature proves the document came from the actor it is
//! attributed to. A misbehaving cache can only withhold acceleration; it never
//! causes a hard failure.

use super::document::{body_to_json, value_or_id};
use super::fetcher::{FetchMode, ResourceFetcher};
use super::{FetchOutcome, FetchSource};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Build the lookup URL for `uri` on `cache_host`.
///
/// The cache host may be given as a URL or as a bare host name (https is
/// assumed). Returns `None` if it has no usable http(s) site.
#[must_use]
pub fn url_in_cache(cache_host: &str, uri: &str) -> Option<String> {
    let cache_host = cache_host.trim();
    let parsed = Url::parse(cache_host)
        .or_else(|_| Url::parse(&format!("https://{cache_host}")))
        .ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    let mut lookup = Url::parse(&parsed.origin().ascii_serialization()).ok()?;
    lookup
        .path_segments_mut()
        .ok()?
        .pop_if_empty()
        .push("get_from_cache")
        .push(uri);
    Some(lookup.into())
}

/// Whether `creator` is the document's actor or the wrapped object's author.
fn attributed_to(json: &Value, creator: &str) -> bool {
    let actor = json.get("actor").and_then(value_or_id);
    let author = json
        .get("object")
        .and_then(|object| object.get("attributedTo"))
        .and_then(value_or_id);
    actor == Some(creator) || author == Some(creator)
}

impl ResourceFetcher {
    /// Fetch a signed copy of `original_uri` from `cache_host`.
    ///
    /// Returns `None` for every kind of cache failure: unreachable host,
    /// missing or non-JSON document, absent or invalid signature, or a signer
    /// that does not match the attribution.
    pub async fn fetch_from_cache(&self, cache_host: &str, original_uri: &str) -> Option<FetchOutcome> {
        let Some(cache_url) = url_in_cache(cache_host, original_uri) else {
            debug!("No usable cache site in {cache_host}");
            return None;
        };

        let mut last_status = None;
        let outcome = match self.process(&cache_url, FetchMode::cache(), &mut last_status).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                debug!("Cache {cache_url} has no usable copy (status {last_status:?})");
                return None;
            }
            Err(e) => {
                warn!("Cache lookup {cache_url} failed: {e}");
                return None;
            }
        };

        let json = match body_to_json(&outcome.body) {
            Ok(json) => json,
            Err(e) => {
                warn!("Cache {cache_url} returned an unreadable body: {e}");
                self.stats.write().cache_rejections += 1;
                return None;
            }
        };

        let creator = match self.creator_verifier.verify_creator(&json).await {
            Ok(Some(creator)) => creator,
            Ok(None) => {
                warn!("Cache copy of {original_uri} carries no valid object signature");
                self.stats.write().cache_rejections += 1;
                return None;
            }
            Err(e) => {
                warn!("Cache copy of {original_uri} could not be verified: {e}");
                self.stats.write().cache_rejections += 1;
                return None;
            }
        };

        if !attributed_to(&json, &creator) {
            warn!("Cache copy of {original_uri} is signed by {creator}, who is not its author");
            self.stats.write().cache_rejections += 1;
            return None;
        }

        let site = Url::parse(&cache_url)
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|_| cache_host.to_string());
        let mut auxiliary = outcome.auxiliary.unwrap_or_default();
        auxiliary.insert("cache_host".to_string(), Value::String(site.clone()));

        debug!("Accepted cache copy of {original_uri} from {site}, signed by {creator}");
        Some(FetchOutcome {
            auxiliary: Some(auxiliary),
            source: FetchSource::Cache { host: site },
            ..outcome
        })
    }
}
