//! Caching HTTP Reverse Proxy
//!
//! A reverse proxy built with Tokio and Axum that forwards all traffic to a
//! single upstream target and caches GET responses in memory.
//!
//! # Architecture Overview
//!
//! ```text
//! client request
//!     → http/server.rs (Axum router, tracing, request ID, timeout)
//!     → cache/middleware.rs (fingerprint, hit replay / miss tee)
//!     → proxy/engine.rs (rewrite, dispatch upstream)
//!     → proxy/relay.rs + proxy/flush.rs (streamed body, periodic flush,
//!       trailer propagation)
//!     → client response
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::config::loader::load_config;
use caching_proxy::config::validation::validate_config;
use caching_proxy::config::ProxyConfig;
use caching_proxy::http::HttpServer;
use caching_proxy::observability::metrics;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "caching-proxy", about = "Caching HTTP reverse proxy")]
struct Args {
    /// Target URL where the traffic will be forwarded to.
    #[arg(long)]
    target_url: Option<String>,

    /// Server port.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    // CLI flags override the config file.
    if let Some(target) = args.target_url {
        config.upstream.target_url = target;
    }
    config.listener.bind_address = format!("0.0.0.0:{}", args.port);

    // Fail fast before binding anything.
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        return Err("configuration validation failed".into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        target_url = %config.upstream.target_url,
        cache_enabled = config.cache.enabled,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "Listening for connections");

    let server = HttpServer::new(config)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
