//! labely-server - Labeling session accounting service
//!
//! Serves datasets to labelers, scores submitted labels against gold
//! standards, and keeps ELO, streak and earnings per labeler.

use anyhow::{Context, Result};
use clap::Parser;
use labely_common::config::{
    default_config_path, load_toml_config, resolve_root_folder, RootFolderInitializer,
    ROOT_FOLDER_ENV,
};
use labely_common::db::init_database;
use labely_common::events::EventBus;
use labely_server::engine::EngineConfig;
use labely_server::expiry::spawn_reaper;
use labely_server::registry::DatasetRegistry;
use labely_server::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for labely-server
#[derive(Parser, Debug)]
#[command(name = "labely-server")]
#[command(about = "Labeling session accounting service for Labely")]
#[command(version)]
struct Args {
    /// Root folder holding labely.db and the datasets directory
    #[arg(short, long, env = "LABELY_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Address to listen on (overrides bind_addr from the config file)
    #[arg(short, long, env = "LABELY_BIND")]
    bind: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "LABELY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing so [logging] can set the default filter
    let config_path = args.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Default::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting Labely server (labely-server) v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: built-in defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, Some(&config));
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let datasets_dir = initializer.datasets_path(&config);
    let registry = Arc::new(
        DatasetRegistry::load_dir(&datasets_dir)
            .with_context(|| format!("Failed to load datasets from {}", datasets_dir.display()))?,
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(pool, registry, EngineConfig::from_toml(&config), event_bus);

    let cancel_token = CancellationToken::new();
    let reaper = spawn_reaper(
        state.engine.clone(),
        Duration::from_secs(config.session.reap_interval_secs.max(1)),
        cancel_token.clone(),
    );

    let app = build_router(state);

    let bind_addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("labely-server listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    let shutdown_token = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
            shutdown_token.cancel();
        })
        .await?;

    cancel_token.cancel();
    reaper.await.context("Session reaper panicked")?;
    info!("labely-server stopped");

    Ok(())
}
