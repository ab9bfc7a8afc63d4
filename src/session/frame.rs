//! Frame and event types for the recognition pipeline.
//!
//! Defines the data that flows from the capture source through the pipeline
//! and the events that flow back to the caller.

/// Raw audio frame delivered by a capture source.
///
/// Samples are interleaved f32 in [-1.0, 1.0]. Frames are ephemeral: the
/// pipeline normalizes them into PCM bytes and never retains them.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Interleaved samples (channel-major within each frame position).
    pub samples: Vec<f32>,
    /// Sample rate the frame was captured at.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl RawFrame {
    /// Creates a mono frame, the common capture case.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Number of sample positions (samples per channel).
    pub fn len(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// True when the frame carries no usable audio.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Control events sent from the session controller to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Session is stopping: flush the buffer, dispatch the remainder, exit.
    Shutdown,
}

/// Unified frame type flowing into the pipeline task.
#[derive(Debug, Clone)]
pub enum PipelineFrame {
    /// Audio from the capture source.
    Audio(RawFrame),
    /// Control event from the session controller.
    Control(ControlEvent),
    /// Asynchronous capture failure, reported to the caller.
    CaptureError(String),
}

/// A packetized unit of normalized PCM ready for one recognition request.
///
/// Invariant: `bytes` has even length (whole 16-bit samples) and is never
/// empty. Chunks are immutable after handoff to the dispatcher.
#[derive(Debug, Clone)]
pub struct PcmChunk {
    /// Monotonic sequence number within the session.
    pub sequence: u64,
    /// 16-bit little-endian mono PCM at the session's target rate.
    pub bytes: Vec<u8>,
    /// True for the flush chunk emitted on stop.
    pub is_final: bool,
}

impl PcmChunk {
    /// Duration of this chunk in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        if sample_rate == 0 {
            return 0;
        }
        (self.bytes.len() as u32 / 2) * 1000 / sample_rate
    }
}

/// A recognized transcript for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Transcribed text.
    pub text: String,
    /// True when produced from the session's final (flush) chunk.
    pub is_final: bool,
}

/// Session lifecycle state.
///
/// Transitions: `Idle --start--> Listening --stop--> Stopping --> Idle`.
/// State changes are the only way chunks get produced or dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Stopping,
}

/// Events delivered to the caller. Fire-and-forget: the session never blocks
/// on a slow event consumer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// RMS sound level in dB for one captured frame.
    SoundLevel(f32),
    /// Normalized PCM bytes for one captured frame (only when `emit_audio`
    /// is enabled).
    Audio(Vec<u8>),
    /// A recognized transcript.
    Transcript(Transcript),
    /// A non-fatal pipeline failure, e.g. a dispatch error.
    Error(String),
    /// A degraded-operation notice, e.g. recognition falling behind capture.
    Warning(String),
}

impl SessionEvent {
    /// Extracts the transcript if this is a Transcript event.
    pub fn into_transcript(self) -> Option<Transcript> {
        match self {
            SessionEvent::Transcript(t) => Some(t),
            _ => None,
        }
    }

    /// True if this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEvent::Error(_))
    }
}
