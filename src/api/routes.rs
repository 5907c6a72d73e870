use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use super::handlers;
use crate::config::Config;
use crate::error::{panic_response, AppError};
use crate::upstream::{build_http_client, UpstreamClient};

pub struct AppState {
    pub config: Config,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let http = build_http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Upstream client for one request; fails before any network traffic
    /// when the credential is missing.
    pub fn upstream(&self) -> Result<UpstreamClient, AppError> {
        let api_key = self.config.require_api_key()?.clone();
        Ok(UpstreamClient::new(
            self.http.clone(),
            self.config.upstream_url.clone(),
            api_key,
        )
        .with_timeout(self.config.upstream_timeout))
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/tts", post(handlers::speak))
        .route("/voices", get(handlers::list_voices))
        .route("/health", get(handlers::health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let static_files =
        ServeDir::new(&state.config.static_dir).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
