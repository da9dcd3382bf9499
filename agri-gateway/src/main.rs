//! agri-gateway - HTTP inference gateway for agricultural models
//!
//! Loads the disease, crop and yield models once, then serves them over
//! HTTP until interrupted.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use agri_common::config::{load_config, resolve_config_path, ConfigOverrides, LoggingConfig};
use agri_gateway::{build_router, models::ModelRegistry, AppState};

/// Command-line arguments for agri-gateway
#[derive(Parser, Debug)]
#[command(name = "agri-gateway")]
#[command(about = "Multi-model agricultural inference gateway")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the ONNX model files
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            model_dir: self.model_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

/// Initialize tracing: RUST_LOG if set, else the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Priority: CLI > environment > TOML > defaults
    let config_path = resolve_config_path(args.config.as_deref());
    let mut config =
        load_config(config_path.as_deref()).context("Failed to load configuration")?;
    config.apply_env_overrides()?;
    config.apply_overrides(&args.overrides());
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting agri-gateway v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using compiled defaults"),
    }
    info!("Model directory: {}", config.models.model_dir.display());

    let registry = ModelRegistry::load(&config.models);
    if !registry.all_loaded() {
        warn!("Starting in degraded mode; see /health for model status");
    }

    let state = AppState::new(registry);
    let app = build_router(state, config.max_upload_bytes);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("agri-gateway listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
