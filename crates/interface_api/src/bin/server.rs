//! Retail Ledger - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run against PostgreSQL
//! API_DATABASE_URL=postgres://... API_JWT_SECRET=... cargo run --bin ledger-api
//!
//! # Run on the in-memory store
//! API_STORAGE=memory cargo run --bin ledger-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Listen address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `API_STORAGE` - `postgres` or `memory` (default: postgres)
//! * `API_LOG_LEVEL` - Log level or filter directive (default: info)
//! * `API_LOG_JSON` - Emit JSON log lines (default: false)
//! * `API_RECONCILE_INTERVAL_SECS` - Background reconciliation period, 0 disables (default: 0)
//! * `API_MAX_SERIAL_ATTEMPTS` - Serial collisions tolerated per append (default: 5)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_ledger::{InMemoryLedgerStore, LedgerStore};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
use interface_api::config::{ApiConfig, StorageBackend};
use interface_api::sweep::spawn_reconciliation_sweep;
use interface_api::{create_router, AppState};

/// Startup runs strictly in order: config, tracing, store (pool and
/// migrations), router, serve.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("invalid API_* configuration")?;

    init_tracing(&config.log_level, config.log_json);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Starting Retail Ledger API Server"
    );

    let store = open_store(&config).await?;
    let state = AppState::new(store, config.clone());

    let sweep = (config.reconcile_interval_secs > 0).then(|| {
        tracing::info!(every_secs = config.reconcile_interval_secs, "Reconciliation sweep enabled");
        spawn_reconciliation_sweep(
            state.engine.clone(),
            Duration::from_secs(config.reconcile_interval_secs),
        )
    });

    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep {
        handle.abort();
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Opens the configured ledger store
async fn open_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory ledger store; data is lost on restart");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(
                DatabaseConfig::new(config.database_url.clone())
                    .max_connections(config.database_max_connections)
                    .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs)),
            )
            .await
            .context("failed to connect to PostgreSQL")?;

            run_migrations(&pool).await.context("failed to apply ledger schema")?;

            tracing::info!("Database ready");
            Ok(Arc::new(PostgresLedgerStore::new(pool)))
        }
    }
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
