//! End-to-end tests for fedfetch.
//!
//! Every test starts real HTTP servers on `127.0.0.1:0` and talks to them
//! through the `reqwest` transport:
//!
//! - an origin server answering scripted routes (actors, HTML pages, keys)
//! - the crate's own cache endpoint backed by an in-memory store
//!
//! ```bash
//! cargo test --test e2e
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod cache_endpoint;
mod resolution;
mod verification;

pub use harness::{dead_origin, keys, CacheServer, OriginServer, Route};
