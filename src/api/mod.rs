pub mod handlers;
pub mod routes;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::upstream::SynthesisRequest;

/// Raw synthesis body. Fields are optional so a missing field is reported as
/// a validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct SpeakRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

impl SpeakRequest {
    pub fn validate(self) -> Result<SynthesisRequest, AppError> {
        match (self.text, self.voice) {
            (Some(text), Some(voice)) if !text.is_empty() && !voice.is_empty() => {
                Ok(SynthesisRequest { text, voice })
            }
            _ => Err(AppError::Validation("text and voice are required".into())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
