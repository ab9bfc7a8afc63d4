//! Error types for speechrelay.

use crate::stt::recognizer::DispatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeechRelayError {
    // Configuration errors
    #[error("Access token is required")]
    MissingToken,

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Capture errors
    #[error("Capture device unavailable: {message}")]
    PermissionDenied { message: String },

    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    // Session state errors
    #[error("Already listening")]
    AlreadyListening,

    #[error("Failed to start session: {message}")]
    Start { message: String },

    #[error("Failed to stop session: {message}")]
    Stop { message: String },

    // Recognition errors
    #[error("Recognition dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpeechRelayError {
    /// Wire-level error code for the command that failed.
    ///
    /// These match the codes the host bridge of the original plugin surfaced
    /// to its callers, so embedders can route on a stable string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "INVALID_TOKEN",
            Self::ConfigInvalidValue { .. } | Self::Config(_) => "INVALID_ARGUMENTS",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Capture { .. } | Self::Start { .. } => "START_ERROR",
            Self::AlreadyListening => "ALREADY_LISTENING",
            Self::Stop { .. } => "STOP_ERROR",
            Self::Dispatch(_) => "DISPATCH_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SpeechRelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_display_and_code() {
        let error = SpeechRelayError::MissingToken;
        assert_eq!(error.to_string(), "Access token is required");
        assert_eq!(error.code(), "INVALID_TOKEN");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = SpeechRelayError::ConfigInvalidValue {
            key: "sample_rate_hertz".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for sample_rate_hertz: must be positive"
        );
        assert_eq!(error.code(), "INVALID_ARGUMENTS");
    }

    #[test]
    fn test_permission_denied_code() {
        let error = SpeechRelayError::PermissionDenied {
            message: "no input device".to_string(),
        };
        assert_eq!(error.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn test_capture_maps_to_start_error() {
        let error = SpeechRelayError::Capture {
            message: "stream build failed".to_string(),
        };
        assert_eq!(error.code(), "START_ERROR");
    }

    #[test]
    fn test_already_listening_code() {
        assert_eq!(
            SpeechRelayError::AlreadyListening.code(),
            "ALREADY_LISTENING"
        );
    }

    #[test]
    fn test_stop_error_code() {
        let error = SpeechRelayError::Stop {
            message: "capture release failed".to_string(),
        };
        assert_eq!(error.code(), "STOP_ERROR");
        assert_eq!(
            error.to_string(),
            "Failed to stop session: capture release failed"
        );
    }

    #[test]
    fn test_dispatch_error_wraps() {
        let error: SpeechRelayError = DispatchError::Network {
            message: "timeout".to_string(),
        }
        .into();
        assert_eq!(error.code(), "DISPATCH_ERROR");
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: SpeechRelayError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
        assert_eq!(error.code(), "INVALID_ARGUMENTS");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SpeechRelayError>();
        assert_sync::<SpeechRelayError>();
    }
}
