//! speechrelay - Streaming microphone audio to Google Speech-to-Text.
//!
//! Capture frames are normalized to 16kHz mono PCM, packetized into chunks,
//! and dispatched one at a time to the recognition backend. Transcripts and
//! sound levels come back as a stream of session events.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod session;
pub mod stt;

// Core traits (capture -> normalize -> dispatch)
pub use audio::capture::{CaptureSource, FrameSink, MockCaptureSource};
pub use stt::recognizer::{DispatchError, MockRecognizer, Recognizer};

// Session
pub use session::controller::SessionController;
pub use session::frame::{RawFrame, SessionEvent, SessionState, Transcript};

// Backends
pub use stt::google::GoogleRecognizer;

// Error handling
pub use error::{Result, SpeechRelayError};

// Config
pub use config::{Config, StartPolicy};
