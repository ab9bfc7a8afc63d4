//! Google Cloud Speech-to-Text REST backend.
//!
//! One synchronous `speech:recognize` call per chunk: LINEAR16 PCM is
//! base64-encoded into the request body and the top alternative of the first
//! result comes back as the transcript.

use crate::defaults;
use crate::stt::recognizer::{DispatchError, Recognizer};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: String,
    sample_rate_hertz: u32,
    language_code: String,
    enable_automatic_punctuation: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    config: &'a RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<SpeechRecognitionResult>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct SpeechRecognitionResult {
    #[serde(default)]
    alternatives: Vec<SpeechRecognitionAlternative>,
}

#[derive(Debug, Deserialize)]
struct SpeechRecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiStatus,
}

/// Recognizer backed by the Google Speech-to-Text v1 REST API.
pub struct GoogleRecognizer {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    config: RecognitionConfig,
}

impl GoogleRecognizer {
    /// Creates a recognizer with the default endpoint and a 30s timeout.
    ///
    /// Falls back to a default client if the configured one cannot be built,
    /// which only happens on broken TLS setups.
    pub fn new(
        access_token: impl Into<String>,
        language_code: impl Into<String>,
        sample_rate_hertz: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: defaults::SPEECH_ENDPOINT.to_string(),
            access_token: access_token.into(),
            config: RecognitionConfig {
                encoding: "LINEAR16".to_string(),
                sample_rate_hertz,
                language_code: language_code.into(),
                enable_automatic_punctuation: true,
            },
        }
    }

    /// Creates a recognizer from recognition settings, applying the
    /// configured endpoint and punctuation preference.
    pub fn from_config(settings: &crate::config::RecognitionSettings) -> Self {
        let recognizer = Self::new(
            settings.access_token.clone(),
            settings.language_code.clone(),
            settings.sample_rate_hertz,
        )
        .with_base_url(settings.endpoint.clone());
        if settings.enable_automatic_punctuation {
            recognizer
        } else {
            recognizer.without_punctuation()
        }
    }

    /// Overrides the API base URL. Used for testing and private endpoints.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        }
        self
    }

    /// Disables automatic punctuation in transcripts.
    pub fn without_punctuation(mut self) -> Self {
        self.config.enable_automatic_punctuation = false;
        self
    }

    fn recognize_url(&self) -> String {
        format!(
            "{}/v1/speech:recognize",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Recognizer for GoogleRecognizer {
    async fn recognize(&self, pcm: &[u8]) -> std::result::Result<Option<String>, DispatchError> {
        let request = RecognizeRequest {
            config: &self.config,
            audio: RecognitionAudio {
                content: BASE64.encode(pcm),
            },
        };

        trace!(bytes = pcm.len(), "dispatching recognition request");
        let response = self
            .client
            .post(self.recognize_url())
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| DispatchError::Network {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            // Error bodies follow the google.rpc.Status shape; fall back to
            // the raw body when they don't.
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(DispatchError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: RecognizeResponse =
            serde_json::from_str(&body).map_err(|e| DispatchError::Parse {
                message: e.to_string(),
            })?;

        if let Some(error) = parsed.error {
            return Err(DispatchError::Api {
                code: error.code,
                message: error.message,
            });
        }

        let transcript = parsed
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript);

        match transcript {
            Some(text) if !text.trim().is_empty() => Ok(Some(text)),
            _ => {
                debug!("recognition returned no speech");
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "google-stt"
    }
}
