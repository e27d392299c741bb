//! Speech synthesis client
//!
//! The external collaborator boundary: one text chunk in, base64-encoded raw
//! PCM out (24 kHz, mono, 16-bit signed little-endian). Failures carry no
//! structured code guarantee, so the controller treats them uniformly.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Request timeout for one chunk's synthesis round-trip
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Contract consumed by the narration controller.
///
/// `synthesize` returns base64 PCM for exactly one chunk. Implementations
/// must not retry internally; retry/fallback policy belongs to the
/// controller.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String>;
}

/// HTTP synthesis client against a generative speech endpoint.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpSynthesizer {
    /// Create a client for `endpoint` (scheme + host, no trailing slash),
    /// a model identifier, and an API key.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn request_url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Build the JSON request body for one chunk.
    ///
    /// The audio response modality and a prebuilt voice are requested; the
    /// endpoint answers with inline base64 PCM at the fixed contract rate.
    fn build_request_body(text: &str, voice_id: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [{ "text": text }]
            }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice_id }
                    }
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String> {
        debug!(voice = voice_id, chars = text.len(), "Requesting chunk synthesis");

        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request_body(text, voice_id))
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("Synthesis request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Synthesis(
                "Synthesis authentication failed: check the API key configuration".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(Error::Synthesis(format!(
                "Synthesis endpoint returned {}",
                status
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Synthesis(format!("Malformed synthesis response: {}", e)))?;

        let audio = parsed
            .candidates
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|mut p| p.drain(..).find_map(|part| part.inline_data))
            .map(|inline| inline.data);

        match audio {
            Some(data) if !data.is_empty() => Ok(data),
            _ => Err(Error::Synthesis("Empty response from synthesis endpoint".to_string())),
        }
    }
}
