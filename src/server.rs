//! Cache-serving endpoint.
//!
//! Peers that cannot reach an origin ask this node for its signed copy:
//!
//! | Request                                 | Status | Cache-Control              |
//! |-----------------------------------------|--------|----------------------------|
//! | `GET /get_from_cache/{uri}`, signed copy | 200    | `private, max-age=259200`  |
//! | unknown, deleted or unsigned subject    | 404    | `public, max-age=180`      |
//! | `GET /get_from_cache` (no uri)          | 404    | `public, max-age=180`      |
//! | undecodable uri                         | 400    | `public, max-age=180`      |

use crate::error::{Error, Result};
use async_trait::async_trait;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Content type of served documents.
const ACTIVITY_JSON: &str = "application/activity+json";

/// Cache-Control for a served copy (three days, private).
const CACHE_CONTROL_FOUND: &str = "private, max-age=259200";

/// Cache-Control for 404 and 400 answers (three minutes, public).
const CACHE_CONTROL_MISS: &str = "public, max-age=180";

/// A document as kept by the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredDocument {
    /// The signed JSON form, if one was produced.
    pub signed_json: Option<String>,
    /// Soft-deleted subjects are never served.
    pub deleted: bool,
}

impl StoredDocument {
    /// A live document with a signed form.
    #[must_use]
    pub fn signed(json: impl Into<String>) -> Self {
        Self {
            signed_json: Some(json.into()),
            deleted: false,
        }
    }

    /// The body to serve, if any.
    fn servable(&self) -> Option<&str> {
        if self.deleted {
            return None;
        }
        self.signed_json.as_deref()
    }
}

/// Lookup of stored documents by URI.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the stored document for `uri`.
    async fn find(&self, uri: &str) -> Result<Option<StoredDocument>>;
}

/// In-memory [`DocumentStore`].
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object mapping URIs to signed documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON object.
    pub fn from_file(path: &FsPath) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let Value::Object(entries) = serde_json::from_str(&content)? else {
            return Err(Error::Config(format!(
                "{} must contain a JSON object",
                path.display()
            )));
        };

        let store = Self::new();
        for (uri, document) in entries {
            let stored = match document {
                Value::Null => StoredDocument::default(),
                Value::String(json) => StoredDocument::signed(json),
                other => StoredDocument::signed(other.to_string()),
            };
            store.insert(uri, stored);
        }
        info!("Loaded {} cached document(s) from {}", store.len(), path.display());
        Ok(store)
    }

    /// Insert or replace the document for `uri`.
    pub fn insert(&self, uri: impl Into<String>, document: StoredDocument) {
        self.documents.write().insert(uri.into(), document);
    }

    /// Soft-delete `uri`. Returns false if it was not stored.
    pub fn mark_deleted(&self, uri: &str) -> bool {
        self.documents
            .write()
            .get_mut(uri)
            .map(|document| document.deleted = true)
            .is_some()
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, uri: &str) -> Result<Option<StoredDocument>> {
        Ok(self.documents.read().get(uri).cloned())
    }
}

/// Build the cache-serving router.
pub fn router(store: Arc<dyn DocumentStore>) -> Router {
    Router::new()
        .route("/get_from_cache", get(missing_uri))
        .route("/get_from_cache/", get(missing_uri))
        .route("/get_from_cache/*uri", get(get_from_cache))
        .with_state(store)
}

/// Serve the cache endpoint on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve<F>(listener: TcpListener, store: Arc<dyn DocumentStore>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Cache endpoint listening on {addr}");
    }
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Cache endpoint stopped");
    Ok(())
}

fn miss(status: StatusCode) -> Response {
    (status, [(CACHE_CONTROL, CACHE_CONTROL_MISS)]).into_response()
}

async fn missing_uri() -> Response {
    miss(StatusCode::NOT_FOUND)
}

async fn get_from_cache(
    State(store): State<Arc<dyn DocumentStore>>,
    uri: std::result::Result<Path<String>, PathRejection>,
) -> Response {
    let uri = match uri {
        Ok(Path(uri)) => uri,
        Err(e) => {
            debug!("Rejected cache lookup: {e}");
            return miss(StatusCode::BAD_REQUEST);
        }
    };
    if uri.is_empty() {
        return miss(StatusCode::NOT_FOUND);
    }

    match store.find(&uri).await {
        Ok(Some(document)) => match document.servable() {
            Some(body) => {
                debug!("Serving cached copy of {uri}");
                (
                    StatusCode::OK,
                    [(CONTENT_TYPE, ACTIVITY_JSON), (CACHE_CONTROL, CACHE_CONTROL_FOUND)],
                    body.to_string(),
                )
                    .into_response()
            }
            None => miss(StatusCode::NOT_FOUND),
        },
        Ok(None) => miss(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!("Document store lookup for {uri} failed: {e}");
            miss(StatusCode::NOT_FOUND)
        }
    }
}
