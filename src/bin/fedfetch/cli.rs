//! Command-line interface definition.

use clap::{Parser, Subcommand};
use fedfetch::ResolverConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Resolve federated resources and check multi-party attestations.
#[derive(Parser, Debug)]
#[command(name = "fedfetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Minimum number of distinct verifier hosts required to trust a document.
    #[arg(long, env = "FEDFETCH_MIN_VERIFIERS", global = true)]
    pub min_verifiers: Option<u32>,

    /// Path of the verifier key file.
    #[arg(long, env = "FEDFETCH_VERIFIERS_FILE", global = true)]
    pub verifiers_file: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FEDFETCH_TIMEOUT_SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Maximum accepted response body size in bytes.
    #[arg(long, env = "FEDFETCH_MAX_BODY_BYTES", global = true)]
    pub max_body_bytes: Option<usize>,

    /// Log level.
    #[arg(long, env = "RUST_LOG", global = true)]
    pub log_level: Option<String>,

    /// Path to configuration file.
    #[arg(long, short, env = "FEDFETCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a URI and print the accepted document.
    Resolve {
        /// URI to resolve.
        uri: String,

        /// Cache host to fall back to when the origin cannot serve the URI.
        #[arg(long, env = "FEDFETCH_CACHE_HOST")]
        cache_host: Option<String>,
    },

    /// Verify a lookup bundle (JSON file) against the trust threshold.
    Verify {
        /// Path of the lookup bundle.
        lookup: PathBuf,
    },

    /// Re-read the verifier key file and resolve missing keys.
    RefreshKeys,

    /// Serve signed documents on the cache endpoint.
    Serve {
        /// Listen address.
        #[arg(long, env = "FEDFETCH_LISTEN")]
        listen: Option<SocketAddr>,

        /// JSON file mapping URIs to signed documents.
        #[arg(long, env = "FEDFETCH_DOCUMENTS_FILE")]
        documents_file: Option<PathBuf>,
    },
}

impl Cli {
    /// Effective log filter before the config file is read.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Merge CLI arguments over the configuration file (or defaults).
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<ResolverConfig> {
        let mut config = match self.config {
            Some(ref path) => ResolverConfig::from_file(path)?,
            None => ResolverConfig::default(),
        };

        if let Some(min_verifiers) = self.min_verifiers {
            config.trust.min_verifiers = Some(min_verifiers);
        }
        if let Some(ref path) = self.verifiers_file {
            config.trust.verifiers_file = Some(path.clone());
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.fetch.timeout_secs = timeout_secs;
        }
        if let Some(max_body_bytes) = self.max_body_bytes {
            config.fetch.max_body_bytes = max_body_bytes;
        }
        if let Some(ref level) = self.log_level {
            config.log_level.clone_from(level);
        }

        if let Command::Serve {
            listen,
            documents_file,
        } = &self.command
        {
            if let Some(listen) = listen {
                config.server.listen = *listen;
            }
            if let Some(path) = documents_file {
                config.server.documents_file = Some(path.clone());
            }
        }

        Ok(config)
    }
}
