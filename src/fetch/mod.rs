//! Resource resolution over the network.
//!
//! A resolution walks these states for one URI:
//!
//! ```text
//! Direct ──(HTML or Link alternate)──► Terminal hop ──► Accept | Miss
//!    │                                        │
//!    └──── Accept | Miss | Failure ◄──────────┘
//!                      │
//!                      ▼
//!          Cache fallback (when a cache host is known)
//! ```
//!
//! Failures on the direct path are carried, not raised, until the cache has
//! had its chance; a cache miss then re-raises the original failure.

mod cache;
pub mod discovery;
pub mod document;
mod fetcher;
mod transport;

pub use cache::url_in_cache;
pub use fetcher::{FetchStats, ResourceFetcher};
pub use transport::{HttpResponse, HttpTransport, Transport};

use crate::error::{Error, Result};
use bytes::Bytes;
use serde_json::{Map, Value};

/// Where an accepted document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    /// The origin, directly or via one discovery hop.
    Origin,
    /// A cache host, after its object signature matched the attribution.
    Cache {
        /// Normalized site of the cache host.
        host: String,
    },
}

/// An accepted document, ready for type-specific interpretation.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The `id` the document declares.
    pub resolved_uri: String,
    /// Raw body.
    pub body: Bytes,
    /// The body was fetched here and can be handed on without refetching.
    pub content_is_prefetched: bool,
    /// Extra facts about how the document was obtained.
    pub auxiliary: Option<Map<String, Value>>,
    /// Origin or cache.
    pub source: FetchSource,
}

impl FetchOutcome {
    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if the body is not a JSON object.
    pub fn json(&self) -> Result<Value> {
        document::body_to_json(&self.body)
    }

    /// Whether the document came from a cache host.
    #[must_use]
    pub fn is_from_cache(&self) -> bool {
        matches!(self.source, FetchSource::Cache { .. })
    }
}

/// Result of a resolution with diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// The accepted document, if any.
    pub outcome: Option<FetchOutcome>,
    /// Last non-200 status seen on the direct path.
    pub last_status: Option<u16>,
}

/// Fetch `url` and decode it as a JSON object, without checking its `id`.
///
/// # Errors
///
/// Returns an error on transport failure, a non-200 status or an undecodable body.
pub async fn fetch_json(transport: &dyn Transport, url: &str, accept: &str) -> Result<Value> {
    let response = transport.get(url, accept).await?;
    if !response.is_ok() {
        return Err(Error::Network(format!(
            "GET {url} returned HTTP {}",
            response.status
        )));
    }
    document::body_to_json(&response.body)
}
