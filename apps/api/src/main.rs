//! # Tally API Server
//!
//! ## Usage
//! ```bash
//! tally-api                          # defaults + platform config file + env
//! tally-api --config ./tally.toml    # explicit config file
//! RUST_LOG=debug,sqlx=warn tally-api
//! ```

use std::path::PathBuf;

use anyhow::Context;
use tally_api::config::{ApiConfig, LogFormat};
use tally_api::{build_router, AppState};
use tally_db::{Database, DbConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args();
    let config = ApiConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(config.logging.format);
    info!("Starting Tally API server...");

    if config.auth.uses_dev_secret() {
        warn!("Using the development JWT secret; set TALLY_JWT_SECRET in production");
    }

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }
    }

    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!(
        path = %config.database.path.display(),
        audit_mode = %config.audit.mode,
        "Database ready"
    );

    let addr = config.listen_addr();
    let state = AppState::new(db.clone(), config);
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Drain queued audit entries before the pool goes away.
    state.services.audit_recorder().flush().await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown...");
}
