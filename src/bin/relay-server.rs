//! Relay server entry point: configuration, logging, migrations, and the
//! trigger/producer HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use relay_core::config::RelayConfig;
use relay_core::scheduler::{BackoffPolicy, BatchCoordinator, HttpDeliverer, PgTaskStore};
use relay_core::web::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    relay_core::logging::init_logging();

    let config = RelayConfig::load().context("failed to load configuration")?;
    if config.database.url.is_empty() {
        anyhow::bail!("database.url is not configured (set RELAY__DATABASE__URL)");
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.pool)
        .connect(&config.database.url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let deliverer = HttpDeliverer::new(
        Duration::from_secs(config.http.request_timeout_secs),
        config.http.user_agent.clone(),
        config.http.response_body_limit,
    )
    .context("failed to build delivery client")?;

    let mut backoff = BackoffPolicy::new(Duration::from_secs(config.scheduler.base_delay_secs));
    if let Some(max_delay_secs) = config.scheduler.max_delay_secs {
        backoff = backoff.with_max_delay(Duration::from_secs(max_delay_secs));
    }

    let coordinator = BatchCoordinator::new(
        PgTaskStore::new(pool.clone()),
        deliverer,
        backoff,
        Duration::from_millis(config.scheduler.pacing_delay_ms),
    );

    let bind_address = config.web.bind_address.clone();
    let state = Arc::new(AppState {
        pool,
        coordinator,
        config,
    });

    let app = web::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %bind_address, "relay server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
