//! Resolver wiring: one object owning the transport, key stores and verifiers.

use crate::config::{ResolverConfig, CACHE_ACCEPT_HEADER};
use crate::error::Result;
use crate::fetch::{FetchOutcome, FetchStats, HttpTransport, Resolution, ResourceFetcher, Transport};
use crate::keys::{KeyCacheStats, KeyResolver, VerifierKeyRegistry, VerifierKeys};
use crate::verify::{LinkedDataSignature, LookupData, SignatureAttestation, SignatureVerifier, TrustResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Builder for constructing a [`Resolver`].
pub struct ResolverBuilder {
    config: ResolverConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ResolverBuilder {
    /// Create a new builder with the given configuration.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Use `transport` instead of an HTTP transport built from the config.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the resolver.
    ///
    /// Nothing is fetched here; the verifier key registry populates on first use.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the trust settings are missing or invalid, or
    /// an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<Resolver> {
        let fetch = &self.config.fetch;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(fetch)?),
        };

        let registry = Arc::new(VerifierKeyRegistry::new(
            &self.config.trust,
            Arc::clone(&transport),
            fetch.accept.clone(),
        )?);
        let key_resolver = Arc::new(KeyResolver::with_capacity(
            Arc::clone(&transport),
            CACHE_ACCEPT_HEADER,
            fetch.key_cache_capacity,
        ));
        let creator_verifier = Arc::new(LinkedDataSignature::new(Arc::clone(&key_resolver)));
        let fetcher = ResourceFetcher::with_accept(Arc::clone(&transport), creator_verifier, fetch.accept.clone());
        let verifier = SignatureVerifier::new(Arc::clone(&registry));

        info!(
            "Resolver ready (min_verifiers = {}, key file = {})",
            registry.min_verifiers(),
            registry.path().display()
        );

        Ok(Resolver {
            config: self.config,
            fetcher,
            verifier,
            registry,
            key_resolver,
        })
    }
}

/// Resolves federated resources and checks attested documents.
pub struct Resolver {
    config: ResolverConfig,
    fetcher: ResourceFetcher,
    verifier: SignatureVerifier,
    registry: Arc<VerifierKeyRegistry>,
    key_resolver: Arc<KeyResolver>,
}

impl Resolver {
    /// Resolve `uri`, falling back to `cache_host` when given.
    ///
    /// # Errors
    ///
    /// Returns the direct-path failure when the cache could not stand in.
    pub async fn resolve(&self, uri: &str, cache_host: Option<&str>) -> Result<Option<FetchOutcome>> {
        self.fetcher.resolve(uri, cache_host).await
    }

    /// Like [`resolve`](Self::resolve), also reporting the last non-200 status.
    ///
    /// # Errors
    ///
    /// Returns the direct-path failure when the cache could not stand in.
    pub async fn resolve_detailed(&self, uri: &str, cache_host: Option<&str>) -> Result<Resolution> {
        self.fetcher.resolve_detailed(uri, cache_host).await
    }

    /// Check attestations over `document` against the trust threshold.
    ///
    /// # Errors
    ///
    /// Returns `Error::Verification` when a known signer's signature is bad.
    pub async fn verify(
        &self,
        document: &Value,
        auxiliary: Option<&Map<String, Value>>,
        attestations: &[SignatureAttestation],
    ) -> Result<TrustResult> {
        self.verifier.verify(document, auxiliary, attestations).await
    }

    /// Verify a lookup bundle, returning its document if trusted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` for undecodable bundles and
    /// `Error::Verification` for forged signatures.
    pub async fn verify_lookup(&self, data: &LookupData) -> Result<Option<Value>> {
        self.verifier.verify_lookup(data).await
    }

    /// Re-read the verifier key file and resolve missing keys again.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be written back.
    pub async fn refresh_keys(&self) -> Result<Arc<VerifierKeys>> {
        self.registry.refresh().await
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The verifier key registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<VerifierKeyRegistry> {
        &self.registry
    }

    /// Resolution statistics.
    #[must_use]
    pub fn fetch_stats(&self) -> FetchStats {
        self.fetcher.stats()
    }

    /// Creator-key cache statistics.
    #[must_use]
    pub fn key_cache_stats(&self) -> KeyCacheStats {
        self.key_resolver.stats()
    }
}
