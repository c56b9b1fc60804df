use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use clarity::config::CONFIG;
use clarity::db::{ClarityStorage, seed};
use clarity::router::{ClarityState, clarity_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        fx_url = %cfg.fx_url,
        loglevel = %cfg.loglevel,
        demo_user = %cfg.demo_user_id.as_deref().unwrap_or("<none>"),
        refresh_key = cfg.fx_refresh_api_key.is_some(),
    );

    let storage = ClarityStorage::connect(&cfg.database_url).await?;
    if cfg.seed_demo {
        seed::seed_demo(&storage).await?;
    }

    let state = ClarityState::new(storage, Arc::new(cfg.clone()))?;
    let app = clarity_router(state);

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutdown signal received");
}
