//! Live TV playback service (tvmp-live) - Main entry point
//!
//! Loads configuration and the channel list, wires the playback managers
//! to a stream engine and serves the HTTP/SSE control surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tvmp_live::api::{self, AppContext};
use tvmp_live::catalog::{ChannelCatalog, StaticCatalog};
use tvmp_live::config::{Config, ConfigOverrides};
use tvmp_live::engine::SimulatedEngine;
use tvmp_live::playback::{BufferManager, ChannelSurfCoordinator, LiveController, SlotGrid};
use tvmp_live::SharedState;

/// Command-line arguments for tvmp-live
#[derive(Parser, Debug)]
#[command(name = "tvmp-live")]
#[command(about = "Live TV playback orchestration service")]
#[command(version)]
struct Args {
    /// Configuration file (default: $TVMP_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "TVMP_PORT")]
    port: Option<u16>,

    /// Channel list file
    #[arg(long, env = "TVMP_CHANNELS")]
    channels: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TVMP_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = tvmp_common::config::resolve_config_path(args.config.as_deref(), "TVMP_CONFIG", "tvmp-live.toml");
    let config = Config::load(
        config_path.as_deref(),
        ConfigOverrides {
            port: args.port,
            channels_file: args.channels,
            log_level: args.log_level,
        },
    )
    .context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tvmp_live={level},tvmp_common={level},tower_http=info").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TVMP Live on port {}", config.port);
    match &config.source {
        Some(path) => info!("Configuration file: {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let catalog = Arc::new(match &config.channels_file {
        Some(path) => StaticCatalog::load(path).context("Failed to load channel list")?,
        None => {
            warn!("No channel list configured; starting with an empty catalog");
            StaticCatalog::new(Vec::new())
        }
    });

    let engine = Arc::new(SimulatedEngine::new(Duration::from_millis(config.engine.ready_delay_ms)));
    let state = Arc::new(SharedState::new());

    let buffer = Arc::new(BufferManager::new(
        engine.clone(),
        catalog.clone(),
        state.clone(),
        config.buffer.clone(),
    ));
    let controller = Arc::new(LiveController::new(
        engine.clone(),
        catalog.clone(),
        state.clone(),
        buffer,
        config.surf.favorites_only,
    ));
    controller.watch_catalog().await;

    let surf = Arc::new(ChannelSurfCoordinator::new(controller.clone(), state.clone(), config.surf.clone()));
    let grid = Arc::new(SlotGrid::new(engine, catalog.clone(), state.clone(), config.multiview.clone()));
    info!("Playback managers initialized");

    if let Some(first) = catalog.ordered_channels().first() {
        if let Err(e) = controller.tune(&first.id).await {
            warn!("Initial tune to {} failed: {}", first.id, e);
        }
    }

    let ctx = AppContext {
        state,
        catalog,
        controller: controller.clone(),
        surf: surf.clone(),
        grid: grid.clone(),
    };

    api::run(config.port, ctx, shutdown_signal())
        .await
        .context("Server error")?;

    // Every session is released before exit
    surf.cancel().await;
    grid.cleanup().await;
    controller.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
