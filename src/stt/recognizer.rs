//! Recognizer abstraction and dispatch errors.
//!
//! The dispatcher only knows the `Recognizer` trait; the Google REST backend
//! implements it and tests substitute `MockRecognizer`.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from one recognition dispatch.
///
/// All of these are non-fatal to the session: the dispatcher reports them as
/// events and keeps consuming chunks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The backend answered with a non-success status.
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    /// The request never completed: connect failure, timeout, broken stream.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The backend answered but the body was not understood.
    #[error("Response parse error: {message}")]
    Parse { message: String },
}

/// A speech recognition backend.
///
/// `recognize` takes one chunk of 16-bit LE mono PCM and returns the top
/// transcript, or `None` when the backend heard no speech. No-speech is an
/// expected outcome, not an error.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, pcm: &[u8]) -> std::result::Result<Option<String>, DispatchError>;

    /// Backend name, for logs.
    fn name(&self) -> &str;
}

/// Scripted recognizer for tests.
///
/// Responses are consumed in order; once the script runs out, further calls
/// report no speech. Every call's payload size is recorded.
pub struct MockRecognizer {
    responses: Mutex<VecDeque<std::result::Result<Option<String>, DispatchError>>>,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a transcript response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(Some(text.into())));
        self
    }

    /// Queues a no-speech response.
    pub fn with_no_speech(self) -> Self {
        self.push(Ok(None));
        self
    }

    /// Queues a failure.
    pub fn with_failure(self, error: DispatchError) -> Self {
        self.push(Err(error));
        self
    }

    /// Payload sizes of every `recognize` call so far, in order.
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, response: std::result::Result<Option<String>, DispatchError>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Recognizer for MockRecognizer {
    async fn recognize(&self, pcm: &[u8]) -> std::result::Result<Option<String>, DispatchError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(pcm.len());
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Ok(None))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_recognizer_scripted_responses() {
        let recognizer = MockRecognizer::new()
            .with_response("hello world")
            .with_no_speech()
            .with_failure(DispatchError::Network {
                message: "timeout".to_string(),
            });

        assert_eq!(
            recognizer.recognize(&[0u8; 10]).await.unwrap(),
            Some("hello world".to_string())
        );
        assert_eq!(recognizer.recognize(&[0u8; 20]).await.unwrap(), None);
        assert!(recognizer.recognize(&[0u8; 30]).await.is_err());
        // Script exhausted: further calls are no-speech.
        assert_eq!(recognizer.recognize(&[0u8; 40]).await.unwrap(), None);

        assert_eq!(recognizer.calls(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_dispatch_error_display() {
        let api = DispatchError::Api {
            code: 401,
            message: "invalid credentials".to_string(),
        };
        assert_eq!(api.to_string(), "API error 401: invalid credentials");

        let network = DispatchError::Network {
            message: "connection refused".to_string(),
        };
        assert_eq!(network.to_string(), "Network error: connection refused");

        let parse = DispatchError::Parse {
            message: "missing field".to_string(),
        };
        assert_eq!(parse.to_string(), "Response parse error: missing field");
    }
}
