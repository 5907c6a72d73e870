pub mod voice;

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use url::Url;

use crate::config::{ApiKey, Config};
use crate::error::AppError;

pub use voice::Voice;

pub const MODEL_ID: &str = "eleven_multilingual_v2";
pub const STABILITY: f32 = 0.4;
pub const SIMILARITY_BOOST: f32 = 0.75;

const API_KEY_HEADER: &str = "xi-api-key";

/// A validated synthesis request: both fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
}

#[derive(Debug, Serialize)]
struct SynthesisPayload<'a> {
    text: &'a str,
    model_id: &'static str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// Audio body still in flight from upstream.
pub struct AudioStream {
    response: reqwest::Response,
}

impl AudioStream {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        self.response.bytes_stream()
    }
}

/// Shared HTTP client for upstream calls. Only connecting is bounded here;
/// a whole-request timeout would also cut off the relayed audio body.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, AppError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.upstream_timeout {
        builder = builder.connect_timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: ApiKey,
    timeout: Option<Duration>,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, base_url: Url, api_key: ApiKey) -> Self {
        Self {
            http,
            base_url,
            api_key,
            timeout: None,
        }
    }

    /// Bounds the wait for upstream's answer: the whole voice listing, and
    /// synthesis up to its response headers. The audio body is never cut.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn list_voices(&self) -> Result<Vec<Voice>, AppError> {
        self.within_deadline("voice listing", self.fetch_voices()).await
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioStream, AppError> {
        self.within_deadline("synthesis", self.start_synthesis(request)).await
    }

    async fn within_deadline<T, F>(&self, what: &str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                tracing::error!("Upstream {} exceeded {:?}", what, limit);
                AppError::Timeout(format!(
                    "Upstream {} did not respond within {}s",
                    what,
                    limit.as_secs()
                ))
            })?,
            None => call.await,
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, AppError> {
        let url = self.endpoint(&["v1", "voices"])?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, self.api_key.expose())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Upstream voices error: {} {}", status, text);
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: non_empty_or(text, || format!("Upstream error {}", status)),
            });
        }

        let content_type = header_str(&response, CONTENT_TYPE);
        if !content_type.to_ascii_lowercase().contains("application/json") {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                "Unexpected content-type from upstream: {} {}",
                content_type,
                preview(&text, 200)
            );
            return Err(AppError::BadGateway(format!(
                "Unexpected content-type: {}",
                content_type
            )));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| AppError::Internal(format!("Failed to decode voice list: {}", e)))?;

        let voices = voice::from_listing(&payload);
        tracing::debug!("Upstream listed {} voices", voices.len());
        Ok(voices)
    }

    async fn start_synthesis(&self, request: &SynthesisRequest) -> Result<AudioStream, AppError> {
        let url = self.endpoint(&["v1", "text-to-speech", request.voice.as_str()])?;
        let payload = SynthesisPayload {
            text: &request.text,
            model_id: MODEL_ID,
            voice_settings: VoiceSettings {
                stability: STABILITY,
                similarity_boost: SIMILARITY_BOOST,
            },
        };

        let response = self
            .http
            .post(url)
            .header(ACCEPT, "audio/mpeg")
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Upstream synthesis error: {} {}", status, text);
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: non_empty_or(text, || format!("Upstream error: {}", status)),
            });
        }

        if response.content_length() == Some(0) {
            return Err(AppError::BadGateway(format!(
                "Upstream error: {} with empty audio body",
                status
            )));
        }

        Ok(AudioStream { response })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Configuration(format!(
                    "Upstream URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(format!("Upstream did not respond in time: {}", e))
    } else if let Some(status) = e.status() {
        AppError::Upstream {
            status: status.as_u16(),
            message: e.to_string(),
        }
    } else {
        AppError::Internal(format!("Upstream request failed: {}", e))
    }
}

fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn non_empty_or(text: String, fallback: impl FnOnce() -> String) -> String {
    if text.trim().is_empty() {
        fallback()
    } else {
        text
    }
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
