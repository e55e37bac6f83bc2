//! Wiring and lifecycle.
//!
//! # Startup
//!
//! 1. Connect Postgres, retrying with exponential backoff, and migrate
//! 2. Connect Redis (fail fast)
//! 3. Install the metrics recorder and serve `/metrics`
//! 4. Build one orchestrator and spawn its consumer loop
//! 5. Serve HTTP
//!
//! # Shutdown
//!
//! On Ctrl+C or SIGTERM the HTTP server stops accepting connections, then
//! the ingress queue closes and the consumer drains buffered and in-flight
//! check-ins within the shutdown budget.

use crate::config::Config;
use anyhow::Context;
use axum::{Router, routing::get};
use smart_parking_core::environment::SystemClock;
use smart_parking_postgres::PostgresReservationStore;
use smart_parking_redis::RedisMutex;
use smart_parking_runtime::{
    CheckInEnvironment, CheckInOrchestrator, CheckOutService, IngressQueue, MetricsServer,
};
use smart_parking_web::{AppState, EventHub, router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Delays between Postgres connection attempts.
const POSTGRES_BACKOFF: [Duration; 5] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
    Duration::from_secs(16),
];

/// Run the server until a shutdown signal arrives and the drain finishes.
///
/// # Errors
///
/// Returns an error if a backing service is unreachable at startup or a
/// listener cannot be bound.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = connect_postgres(&config).await?;
    store.migrate().await.context("Failed to run migrations")?;

    let mutex = RedisMutex::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    mutex.ping().await.context("Redis did not answer PING")?;
    info!(url = %config.redis.url, "Connected to Redis");

    spawn_metrics(&config).await?;

    let events = EventHub::default();
    let clock = Arc::new(SystemClock);
    let env = CheckInEnvironment::new(
        Arc::new(store),
        Arc::new(mutex),
        Arc::new(events.clone()),
        clock.clone(),
        &config.checkin,
    );
    let checkout = CheckOutService::from_environment(&env);
    let orchestrator = CheckInOrchestrator::new(env, config.checkin.clone());
    let (ingress, receiver) = IngressQueue::bounded(config.checkin.queue_capacity, clock);
    let consumer = orchestrator.spawn(receiver);

    let state = AppState::new(ingress, checkout, orchestrator.gate().clone(), events);
    let listener = TcpListener::bind(config.http_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr()))?;
    info!(address = %config.http_addr(), "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, draining check-ins");
    let report = consumer.shutdown(config.server.shutdown_timeout).await;
    info!(
        processed = report.processed,
        committed = report.committed,
        failed = report.failed,
        aborted = report.aborted,
        timed_out = report.timed_out,
        "Graceful shutdown complete"
    );
    Ok(())
}

async fn connect_postgres(config: &Config) -> anyhow::Result<PostgresReservationStore> {
    let url = &config.postgres.url;
    let max = config.postgres.max_connections;

    for (attempt, delay) in POSTGRES_BACKOFF.iter().enumerate() {
        match PostgresReservationStore::connect(url, max).await {
            Ok(store) => {
                info!(attempt = attempt + 1, "Connected to Postgres");
                return Ok(store);
            },
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "Postgres not reachable, retrying"
                );
                tokio::time::sleep(*delay).await;
            },
        }
    }

    PostgresReservationStore::connect(url, max)
        .await
        .context("Failed to connect to Postgres")
}

async fn spawn_metrics(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .metrics_addr()
        .parse()
        .with_context(|| format!("Invalid metrics address {}", config.metrics_addr()))?;
    let mut metrics = MetricsServer::new(addr);
    metrics.start()?;

    let Some(handle) = metrics.handle().cloned() else {
        warn!("Metrics recorder owned elsewhere, /metrics not served");
        return Ok(());
    };
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint {addr}"))?;
    info!(%addr, "Metrics endpoint listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics endpoint stopped");
        }
    });
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
