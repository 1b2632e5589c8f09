//! HTTP transport used by every outbound fetch.

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::header::{ACCEPT, CONTENT_TYPE, LINK};
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::debug;

/// Maximum number of HTTP redirects followed by the transport.
const MAX_REDIRECTS: usize = 5;

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL the response came from, after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Type` header.
    pub content_type: Option<String>,
    /// Raw `Link` header(s), comma-joined.
    pub link: Option<String>,
    /// Body. Empty for non-200 responses.
    pub body: Bytes,
}

impl HttpResponse {
    /// Media type without parameters, lowercased.
    #[must_use]
    pub fn mime_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Whether the response is a plain 200.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Performs a single GET.
///
/// Implementations must bound every request by a timeout and reject bodies
/// over their size ceiling instead of truncating them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` with the given `Accept` header.
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    max_body_bytes: usize,
}

impl HttpTransport {
    /// Create a transport from fetch configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(10)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Network(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn map_error(url: &str, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(url.to_string())
        } else {
            Error::Network(format!("GET {url}: {err}"))
        }
    }

    fn too_large(&self, url: &str) -> Error {
        Error::BodyTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, accept: &str) -> Result<HttpResponse> {
        debug!("GET {url}");

        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| Self::map_error(url, &e))?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let links: Vec<&str> = headers
            .get_all(LINK)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let link = (!links.is_empty()).then(|| links.join(", "));

        if status != 200 {
            debug!("GET {url} returned HTTP {status}");
            return Ok(HttpResponse {
                url: final_url,
                status,
                content_type,
                link,
                body: Bytes::new(),
            });
        }

        let limit = u64::try_from(self.max_body_bytes).unwrap_or(u64::MAX);
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(self.too_large(url));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Self::map_error(url, &e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            url: final_url,
            status,
            content_type,
            link,
            body: body.freeze(),
        })
    }
}
