//! Default configuration constants for speechrelay.
//!
//! Shared across configuration types so the pipeline, the dispatcher, and the
//! tests all agree on the same numbers.

/// Target sample rate in Hz for normalized PCM.
///
/// 16kHz mono LINEAR16 is what the Google Speech-to-Text REST API expects for
/// voice audio and keeps request payloads small.
pub const SAMPLE_RATE: u32 = 16_000;

/// Bytes per normalized sample (16-bit PCM).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Default chunk duration in seconds.
///
/// Each recognition request carries this much audio. 3 seconds balances
/// transcript latency against per-request overhead.
pub const CHUNK_DURATION_SECS: u32 = 3;

/// Hard cap on buffered audio, in seconds.
///
/// If a dispatch is still in flight when this much audio has accumulated, a
/// chunk is forced and queued rather than dropping capture data.
pub const MAX_CHUNK_DURATION_SECS: u32 = 10;

/// Request timeout for one recognition call, in seconds.
///
/// Applies to connect and to the whole request; exceeding it surfaces as a
/// network dispatch error, never an indefinite hang.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default BCP-47 language code for recognition.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Base URL of the Google Speech-to-Text REST API.
pub const SPEECH_ENDPOINT: &str = "https://speech.googleapis.com";

/// RMS floor used when converting to decibels.
///
/// Silence clamps to this value so the dB computation never produces
/// `-inf` or NaN. `20 * log10(1e-5)` = -100 dB.
pub const RMS_FLOOR: f64 = 1e-5;

/// Sound level reported for an all-zero frame, in dB.
pub const DB_FLOOR: f32 = -100.0;

/// Capacity of the capture-to-pipeline frame channel.
///
/// At ~100ms per capture callback this buffers tens of seconds of frames;
/// overflow increments a drop counter instead of blocking the audio callback.
pub const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the outbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
