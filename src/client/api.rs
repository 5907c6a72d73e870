use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use super::ClientError;
use crate::upstream::Voice;

/// Result of asking the server for its voice list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceListing {
    Voices(Vec<Voice>),
    /// The server answered with `{"error": ...}`.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisReply {
    Audio(Bytes),
    /// Anything that is not a successful audio response, with the most
    /// useful detail the body offered.
    Rejected(Option<String>),
}

/// The two proxy calls as seen from a front-end.
#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn fetch_voices(&self) -> Result<VoiceListing, ClientError>;

    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisReply, ClientError>;
}

pub struct ProxyClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", name]);
        }
        url
    }
}

#[async_trait]
impl SpeechApi for ProxyClient {
    async fn fetch_voices(&self) -> Result<VoiceListing, ClientError> {
        let payload: Value = self
            .http
            .get(self.endpoint("voices"))
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?
            .json()
            .await?;

        match payload {
            Value::Array(_) => {
                let voices = serde_json::from_value(payload)
                    .map_err(|e| ClientError::UnexpectedPayload(e.to_string()))?;
                Ok(VoiceListing::Voices(voices))
            }
            Value::Object(ref fields) => match fields.get("error") {
                Some(Value::String(message)) => Ok(VoiceListing::Failed(message.clone())),
                Some(other) => Ok(VoiceListing::Failed(other.to_string())),
                None => Err(ClientError::UnexpectedPayload(payload.to_string())),
            },
            other => Err(ClientError::UnexpectedPayload(other.to_string())),
        }
    }

    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisReply, ClientError> {
        let response = self
            .http
            .post(self.endpoint("tts"))
            .json(&serde_json::json!({ "text": text, "voice": voice }))
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() || !content_type.starts_with("audio/") {
            let body = response.text().await?;
            tracing::debug!("Synthesis rejected: {} ({}) {}", status, content_type, body);
            return Ok(SynthesisReply::Rejected(describe_failure(&body)));
        }

        Ok(SynthesisReply::Audio(response.bytes().await?))
    }
}

/// Pulls a human-readable detail out of an error body: the structured
/// `error` field first, then the raw text.
pub fn describe_failure(body: &str) -> Option<String> {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        match fields.get("error") {
            Some(Value::String(message)) if !message.is_empty() => return Some(message.clone()),
            Some(Value::Null) | Some(Value::String(_)) | None => {}
            Some(other) => return Some(other.to_string()),
        }
    }

    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
