use anyhow::{Context, Result};
use case_study_api::{
    config::Config,
    routes::{create_router, AppState},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the environment is already populated)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("case_study_api=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting case study API (environment: {}, translation backend: {:?}, attribute: {})",
        config.environment, config.translation_backend, config.text_attribute
    );

    let state = Arc::new(AppState::from_config(&config).await?);
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
