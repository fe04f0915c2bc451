//! Worker entry point.

use std::sync::Arc;

use common::SystemClock;
use delivery::OutboxPoller;
use metrics_exporter_prometheus::PrometheusHandle;
use outbox_store::{InMemoryOutboxStore, OutboxStore, PostgresOutboxStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::config::Config;
use worker::error::WorkerError;
use worker::{AppState, create_app, default_registry};

/// Waits for SIGINT or SIGTERM, then cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
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
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
        () = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}

async fn run<S: OutboxStore + Clone + 'static>(
    store: S,
    config: Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), WorkerError> {
    let clock = SystemClock::shared();
    let shutdown = CancellationToken::new();

    // 1. Start the poller
    let (registry, inbox) = default_registry();
    let poller = OutboxPoller::new(
        store.clone(),
        Arc::new(registry),
        Arc::clone(&clock),
        config.outbox.clone(),
    )
    .spawn(shutdown.clone());

    // 2. Serve health, dead letters, notifications and metrics
    let state = Arc::new(AppState::new(store, clock, config.outbox.health.clone(), inbox));
    let app = create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting worker");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await;

    // 3. Let the poller finish its current pass
    shutdown.cancel();
    poller.await?;
    served?;

    tracing::info!("worker shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()?;

    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await?;
            let store = PostgresOutboxStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL outbox store");
            run(store, config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory outbox store");
            run(InMemoryOutboxStore::new(), config, metrics_handle).await
        }
    }
}
