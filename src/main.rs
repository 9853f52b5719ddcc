//! dynapi server binary.
//!
//! Loads the platform configuration, assembles the platform (datasources,
//! cache, script host, preloaded endpoints) and serves the dispatcher over
//! HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynapi::config::{load_config, PlatformConfig};
use dynapi::platform::ApiPlatform;

#[derive(Parser, Debug)]
#[command(name = "dynapi", about = "Low-code API platform server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address for the HTTP server.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynapi=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => PlatformConfig::default(),
    };

    tracing::info!(
        datasources = config.datasources.len(),
        endpoints = config.endpoints.len(),
        cache_capacity = config.cache.capacity,
        "configuration loaded"
    );

    let platform = Arc::new(ApiPlatform::builder(config).build()?);
    let app = dynapi::serve::router(platform);

    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
