//! Smart-parking check-in server.
//!
//! # Usage
//!
//! ```bash
//! # Start Postgres and Redis, then
//! DATABASE_URL=postgres://... REDIS_URL=redis://... cargo run -p smart-parking-server
//! ```

use smart_parking_server::{Config, app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,smart_parking=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        http = %config.http_addr(),
        gate_capacity = config.checkin.gate_capacity,
        queue_capacity = config.checkin.queue_capacity,
        "Starting smart-parking server"
    );

    app::run(config).await
}
