//! Session configuration: recognition credentials, audio settings, and
//! chunking bounds.
//!
//! Loaded from TOML with every field optional (missing fields fall back to
//! defaults), then optionally overridden from environment variables.

use crate::defaults;
use crate::error::{Result, SpeechRelayError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub recognition: RecognitionSettings,
    pub audio: AudioSettings,
    pub session: SessionSettings,
}

/// Recognition backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionSettings {
    /// OAuth2 bearer token for the Speech API. Usually supplied via the
    /// `SPEECHRELAY_TOKEN` environment variable rather than the config file.
    pub access_token: String,
    /// BCP-47 language code, e.g. "en-US".
    pub language_code: String,
    /// Sample rate of the normalized audio sent for recognition.
    pub sample_rate_hertz: u32,
    /// Ask the backend to punctuate transcripts.
    pub enable_automatic_punctuation: bool,
    /// Base URL of the recognition endpoint.
    pub endpoint: String,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    /// Input device name. None uses the system default.
    pub device: Option<String>,
    /// Capacity of the capture-to-pipeline frame channel.
    pub frame_channel_capacity: usize,
}

/// Session behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Soft chunk duration in seconds; one recognition request per chunk.
    pub chunk_duration_secs: u32,
    /// Hard cap in seconds before a chunk is forced while dispatch is busy.
    pub max_duration_secs: u32,
    /// What `start` does when the session is already listening.
    pub start_policy: StartPolicy,
    /// Emit normalized PCM bytes per frame as `SessionEvent::Audio`.
    pub emit_audio: bool,
}

/// Behavior of `start` while already listening.
///
/// The original plugin's platform halves disagreed: one errored, one treated
/// it as a success no-op. Both are supported; `Idempotent` is the default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// Repeated start is a success no-op.
    #[default]
    Idempotent,
    /// Repeated start fails with `ALREADY_LISTENING`.
    Strict,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            language_code: defaults::DEFAULT_LANGUAGE.to_string(),
            sample_rate_hertz: defaults::SAMPLE_RATE,
            enable_automatic_punctuation: true,
            endpoint: defaults::SPEECH_ENDPOINT.to_string(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            frame_channel_capacity: defaults::FRAME_CHANNEL_CAPACITY,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunk_duration_secs: defaults::CHUNK_DURATION_SECS,
            max_duration_secs: defaults::MAX_CHUNK_DURATION_SECS,
            start_policy: StartPolicy::Idempotent,
            emit_audio: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't exist.
    ///
    /// Invalid TOML is still an error; only a missing file falls back.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(SpeechRelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported:
    /// - `SPEECHRELAY_TOKEN` → recognition.access_token
    /// - `SPEECHRELAY_LANGUAGE` → recognition.language_code
    /// - `SPEECHRELAY_ENDPOINT` → recognition.endpoint
    /// - `SPEECHRELAY_AUDIO_DEVICE` → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("SPEECHRELAY_TOKEN") {
            if !token.is_empty() {
                self.recognition.access_token = token;
            }
        }
        if let Ok(language) = std::env::var("SPEECHRELAY_LANGUAGE") {
            if !language.is_empty() {
                self.recognition.language_code = language;
            }
        }
        if let Ok(endpoint) = std::env::var("SPEECHRELAY_ENDPOINT") {
            if !endpoint.is_empty() {
                self.recognition.endpoint = endpoint;
            }
        }
        if let Ok(device) = std::env::var("SPEECHRELAY_AUDIO_DEVICE") {
            if !device.is_empty() {
                self.audio.device = Some(device);
            }
        }
        self
    }

    /// Validate that the configuration can actually drive a session.
    ///
    /// Called by the session controller on `start`; failures leave session
    /// state unchanged.
    pub fn validate(&self) -> Result<()> {
        if self.recognition.access_token.trim().is_empty() {
            return Err(SpeechRelayError::MissingToken);
        }
        if self.recognition.language_code.trim().is_empty() {
            return Err(SpeechRelayError::ConfigInvalidValue {
                key: "language_code".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.recognition.sample_rate_hertz == 0 {
            return Err(SpeechRelayError::ConfigInvalidValue {
                key: "sample_rate_hertz".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.session.chunk_duration_secs == 0 {
            return Err(SpeechRelayError::ConfigInvalidValue {
                key: "chunk_duration_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.session.max_duration_secs < self.session.chunk_duration_secs {
            return Err(SpeechRelayError::ConfigInvalidValue {
                key: "max_duration_secs".to_string(),
                message: "must be >= chunk_duration_secs".to_string(),
            });
        }
        Ok(())
    }
}
