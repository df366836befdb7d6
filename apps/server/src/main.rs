//! # Libris Server
//!
//! Binary entry point: logging, configuration, database, HTTP listener.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Startup Sequence                                 │
//! │                                                                         │
//! │  tracing ──► ServerConfig::load ──► Database::new (+ migrations)       │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                         axum::serve ◄── router(AppState)               │
//! │                              │                                          │
//! │                    Ctrl+C / SIGTERM ──► graceful shutdown ──► pool close│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use libris_db::{Database, DbConfig};
use libris_server::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,libris=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Libris server...");

    // Load configuration
    let config = ServerConfig::load().context("invalid configuration")?;
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        "Configuration loaded"
    );

    // Connect to database (runs migrations)
    let db_config = DbConfig::new(&config.database_path).max_connections(config.db_max_connections);
    let db = Database::new(db_config)
        .await
        .context("failed to open database")?;

    let addr = config.http_addr;
    let state = AppState::new(db.clone(), config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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
