//! Inventory Alerting Engine - watcher process
//!
//! Long-running background process that subscribes to the inventory
//! collections and runs the alerting and reconciliation rules until it
//! receives Ctrl+C or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use inventory_alerting_backend::config::{Config, StoreBackend};
use inventory_alerting_backend::store::{MemoryStore, PgStore, RecordStore};
use inventory_alerting_backend::Engine;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ia_watcher=debug,inventory_alerting_backend=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("Failed to load configuration")?;

    tracing::info!("Starting Inventory Alerting Engine");
    tracing::info!("Environment: {}", config.environment);

    let store = connect_store(&config).await?;

    let engine = Engine::new(store, &config);
    let mut supervisor = engine.supervisor();
    supervisor.start().await?;

    shutdown_signal().await;

    supervisor.shutdown().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Build the configured record store
async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let store = PgStore::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connection established");

            if config.database.run_migrations {
                tracing::info!("Running database migrations...");
                store.migrate().await?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(store))
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
