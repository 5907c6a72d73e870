use std::any::Any;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Bad request: {0}")]
    Validation(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Upstream timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            // Mirror upstream, but never emit something that is not an error status
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::BadGateway(_) => "BAD_GATEWAY",
            AppError::Timeout(_) => "UPSTREAM_TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The text placed in the `error` field, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::Configuration(msg)
            | AppError::Validation(msg)
            | AppError::BadGateway(msg)
            | AppError::Timeout(msg)
            | AppError::Internal(msg) => msg,
            AppError::Upstream { message, .. } => message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({}) - {}", code, status, self.message());
        } else {
            tracing::warn!("Request rejected: {} ({}) - {}", code, status, self.message());
        }

        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Json(ErrorResponse {
                error: self.message().to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Renders a handler panic as the regular JSON error body.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown server error".to_string()
    };

    AppError::Internal(message).into_response()
}
