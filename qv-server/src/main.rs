//! Quality Verification server (qv-server) - Main entry point

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qv_common::config::{
    database_path, ensure_root_folder, locate_config_file, resolve_root_folder, QvConfig,
};
use qv_common::db::init::init_database;
use qv_common::tolerance::ToleranceTable;
use qv_server::{build_router, AppState};

/// Command-line arguments for qv-server
#[derive(Parser, Debug)]
#[command(name = "qv-server")]
#[command(about = "Shop-floor quality verification service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "QV_PORT")]
    port: Option<u16>,

    /// Folder holding the database and export template
    #[arg(short, long, env = "QV_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "QV_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level applies
    let config_path = locate_config_file(args.config.as_deref(), args.root_folder.as_deref());
    let loaded = config_path.as_deref().map(QvConfig::load);
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => QvConfig::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("qv_server={0},qv_common={0},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting QV server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match (&config_path, loaded) {
        (Some(path), Some(Ok(_))) => info!("Loaded config: {}", path.display()),
        (Some(path), Some(Err(e))) => {
            warn!("Failed to load config {}: {} (using defaults)", path.display(), e)
        }
        _ => info!("No config file found, using defaults"),
    }

    let root_folder =
        resolve_root_folder(args.root_folder.as_deref(), "QV_ROOT_FOLDER", Some(&config));
    ensure_root_folder(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path, &config)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready: {}", db_path.display());

    let tolerances = ToleranceTable::with_overrides(config.tolerances.clone());
    let export_template = config.export_template_path(&root_folder);
    info!("Export template: {}", export_template.display());

    let state = AppState::new(pool, tolerances, export_template);
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", config.bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("qv-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
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
