//! # fedfetch
//!
//! Resolves federated resources (actors, activities, keys) by URI and decides
//! whether a copy obtained from a secondary cache host can be trusted.
//!
//! ## Architecture
//!
//! ```text
//! resolve(uri, cache_host)
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ Negotiated fetch    │──── HTML / Link ───► one terminal hop
//! └─────────┬───────────┘
//!           │
//!    ┌──────┴──────┐
//!    │             │
//!  FOUND     MISS / FAILURE
//!    │             │
//!    ▼             ▼
//! Return      ┌──────────────────────┐
//!             │ GET {cache}/get_from_ │
//!             │ cache/{uri}           │
//!             └─────────┬────────────┘
//!                       │
//!                       ▼
//!             linked-data signature
//!             must match actor or
//!             object.attributedTo
//! ```
//!
//! Multi-party attested documents go through [`SignatureVerifier`], which
//! checks each attestation against the [`VerifierKeyRegistry`] and trusts the
//! document once enough distinct hosts vouch for it.

pub mod canonical;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod resolver;
pub mod server;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ResolverConfig;
pub use error::{Error, Result};
pub use fetch::{FetchOutcome, FetchSource, FetchStats, HttpTransport, Resolution, ResourceFetcher, Transport};
pub use keys::{KeyResolver, VerifierKeyRegistry, VerifierKeys};
pub use resolver::{Resolver, ResolverBuilder};
pub use server::{DocumentStore, MemoryDocumentStore, StoredDocument};
pub use verify::{
    Attestor, CreatorVerifier, LinkedDataSignature, LookupData, SignatureAttestation,
    SignatureVerifier, TrustResult,
};
