//! Service entrypoint: configuration from the environment, one router, one
//! listener.

use bindery_core::config::Config;
use bindery_web::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = std::env::var("BINDERY_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let state = AppState::new(&config)?;
    let app = router(state, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        environment = %config.environment,
        "bindery listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
