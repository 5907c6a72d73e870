use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use std::sync::Arc;

use super::{HealthResponse, SpeakRequest};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::upstream::Voice;

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";
pub const AUDIO_DISPOSITION: &str = "inline; filename=\"voice.mp3\"";

/// The body is parsed as JSON whatever its `Content-Type`.
pub async fn speak(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, AppError> {
    // Credential is checked before the body is looked at
    let upstream = state.upstream()?;

    let body = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let request: SpeakRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?;
    let request = request.validate()?;

    tracing::info!(
        "Synthesizing {} chars with voice {}",
        request.text.chars().count(),
        request.voice
    );

    let audio = upstream.synthesize(&request).await?;
    if let Some(len) = audio.content_length() {
        tracing::debug!("Relaying {} bytes of audio", len);
    }

    let stream = audio
        .into_stream()
        .inspect_err(|e| tracing::error!("Audio relay interrupted: {}", e));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, AUDIO_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
            (header::CONTENT_DISPOSITION, AUDIO_DISPOSITION),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Voice>>, AppError> {
    let upstream = state.upstream()?;
    let voices = upstream.list_voices().await?;
    Ok(Json(voices))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
