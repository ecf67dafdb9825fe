//! API server entry point.

use std::sync::Arc;

use api::catalog::{self, CatalogError};
use api::config::{Config, LogFormat};
use booking_store::{BookingStore, InMemoryBookingStore, PostgresBookingStore, StoreError};
use lifecycle::{InMemoryScheduleCatalog, LifecycleError, Sweeper};
use metrics_exporter_prometheus::{BuildError, PrometheusHandle};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
enum ServerError {
    #[error("metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("database connection: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("inventory recovery: {0}")]
    Recovery(#[from] LifecycleError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install SIGINT handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S: BookingStore + 'static>(
    store: S,
    catalog: InMemoryScheduleCatalog,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), ServerError> {
    let state = api::create_default_state(store, catalog, config.lifecycle_config());

    // Seats held or sold before a restart live only in the store
    state.lifecycle.recover().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Sweeper::new(Arc::clone(&state.lifecycle), config.sweep_interval())
        .spawn(shutdown_rx);

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "sweeper task failed");
    }
    served?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    api::describe_metrics();

    // 3. Seed the schedule catalog
    let catalog = match &config.schedules_file {
        Some(path) => {
            let schedules = catalog::load_schedules(path).await?;
            tracing::info!(count = schedules.len(), path = %path.display(), "schedules loaded");
            InMemoryScheduleCatalog::with_schedules(schedules)
        }
        None => {
            tracing::warn!("SCHEDULES_FILE not set, schedule catalog is empty");
            InMemoryScheduleCatalog::new()
        }
    };

    // 4. Pick the booking store and run
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresBookingStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL booking store");
            serve(store, catalog, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings are kept in memory only");
            serve(InMemoryBookingStore::new(), catalog, &config, metrics_handle).await
        }
    }
}
