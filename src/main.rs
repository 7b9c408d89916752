use anyhow::Context;
use tracing_subscriber::EnvFilter;

use fieldops_api::{app, config::AppConfig, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, SUPABASE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting FieldOps API in {:?} mode", config.environment);
    if config.uses_development_secret() {
        tracing::warn!("JWT_SECRET not set, signing tokens with the development secret");
    }

    let store = state::connect_store(&config).await.context("failed to initialise table store")?;
    let port = config.port;
    let app = app::router(state::AppState::new(config, store));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("FieldOps API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
