use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use voice_proxy::api::routes::{create_router, AppState};
use voice_proxy::config::Config;
use voice_proxy::error::AppError;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let addr = config.bind_addr()?;

    tracing::info!("Voice Proxy Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Upstream: {}", config.upstream_url);
    tracing::info!("Static files: {}", config.static_dir.display());
    match config.upstream_timeout {
        Some(timeout) => tracing::info!("Upstream timeout: {}s", timeout.as_secs()),
        None => tracing::warn!("Upstream timeout disabled; a stalled upstream stalls its request"),
    }
    if config.api_key.is_none() {
        tracing::warn!("ELEVENLABS_API_KEY is not set; proxy endpoints will answer 500");
    }

    let state = Arc::new(AppState::new(config)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Configuration(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))
}
