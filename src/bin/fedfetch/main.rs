//! fedfetch CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::{bail, WrapErr};
use fedfetch::keys::fingerprint;
use fedfetch::server::{self, DocumentStore, MemoryDocumentStore};
use fedfetch::{FetchSource, LookupData, ResolverBuilder, ResolverConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.to_config()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("fedfetch v{} ({})", env!("CARGO_PKG_VERSION"), cli.log_filter());

    match cli.command {
        Command::Resolve { uri, cache_host } => resolve(config, &uri, cache_host.as_deref()).await,
        Command::Verify { lookup } => verify(config, &lookup).await,
        Command::RefreshKeys => refresh_keys(config).await,
        Command::Serve { .. } => serve(config).await,
    }
}

async fn resolve(config: ResolverConfig, uri: &str, cache_host: Option<&str>) -> color_eyre::Result<()> {
    let resolver = ResolverBuilder::new(config).build()?;
    let resolution = resolver.resolve_detailed(uri, cache_host).await?;

    let Some(outcome) = resolution.outcome else {
        match resolution.last_status {
            Some(status) => bail!("{uri} not found (last status {status})"),
            None => bail!("{uri} not found"),
        }
    };

    if let FetchSource::Cache { host } = &outcome.source {
        warn!("{uri} was served by cache host {host}");
    }
    let json = outcome.json()?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn verify(config: ResolverConfig, path: &std::path::Path) -> color_eyre::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("reading {}", path.display()))?;
    let lookup: LookupData = serde_json::from_str(&content).wrap_err("parsing lookup bundle")?;

    let resolver = ResolverBuilder::new(config).build()?;
    match resolver.verify_lookup(&lookup).await? {
        Some(document) => {
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        None => bail!("document is not trusted"),
    }
}

async fn refresh_keys(config: ResolverConfig) -> color_eyre::Result<()> {
    let resolver = ResolverBuilder::new(config).build()?;
    let keys = resolver.refresh_keys().await?;

    for (uri, key) in keys.iter() {
        match key {
            Some(key) => println!("{uri}  {}", fingerprint(key)?),
            None => println!("{uri}  unresolved"),
        }
    }
    info!(
        "{} of {} verifier key(s) resolved, written to {}",
        keys.resolved_count(),
        keys.len(),
        resolver.registry().path().display()
    );
    Ok(())
}

async fn serve(config: ResolverConfig) -> color_eyre::Result<()> {
    let store: Arc<dyn DocumentStore> = match config.server.documents_file {
        Some(ref path) => Arc::new(MemoryDocumentStore::from_file(path)?),
        None => {
            warn!("No documents file configured; every lookup will be a 404");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let listener = TcpListener::bind(config.server.listen)
        .await
        .wrap_err_with(|| format!("binding {}", config.server.listen))?;

    server::serve(listener, store, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    })
    .await?;

    info!("Goodbye!");
    Ok(())
}
