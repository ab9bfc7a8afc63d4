//! Capture source abstraction.
//!
//! The session controller only knows `CaptureSource`; real microphone input
//! lives behind the `cpal-audio` feature and tests drive the pipeline with
//! `MockCaptureSource`.

use crate::error::Result;
use crate::session::frame::{PipelineFrame, RawFrame};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Handle a capture source uses to push frames into the pipeline.
///
/// Pushing never blocks. When the pipeline falls behind, frames are dropped
/// and counted rather than stalling the capture callback.
#[derive(Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<PipelineFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn new(tx: mpsc::Sender<PipelineFrame>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pushes one audio frame, dropping it if the channel is full.
    pub fn push_frame(&self, frame: RawFrame) {
        if self.tx.try_send(PipelineFrame::Audio(frame)).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total == 1 || total % 100 == 0 {
                warn!(dropped = total, "pipeline is behind, dropping frames");
            }
        }
    }

    /// Reports an asynchronous capture failure to the pipeline.
    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self
            .tx
            .try_send(PipelineFrame::CaptureError(message.into()));
    }

    /// Total frames dropped because the pipeline was behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Source of raw audio frames.
///
/// `start` must deliver frames to the sink until `stop` is called. Both
/// methods must tolerate repeated calls: stopping a stopped source is a
/// no-op.
pub trait CaptureSource: Send {
    /// Begins capture, delivering frames to `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<()>;

    /// Ends capture and releases the underlying device.
    fn stop(&mut self) -> Result<()>;
}

/// Scripted capture source for tests.
///
/// Delivers its configured frames synchronously on `start`, then goes quiet.
pub struct MockCaptureSource {
    frames: Vec<RawFrame>,
    fail_start: Option<String>,
    fail_stop: Option<String>,
    started: bool,
    sink: Option<FrameSink>,
}

impl MockCaptureSource {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            fail_start: None,
            fail_stop: None,
            started: false,
            sink: None,
        }
    }

    /// Frames to deliver when started.
    pub fn with_frames(mut self, frames: Vec<RawFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Makes `start` fail with the given message.
    pub fn with_start_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_start = Some(message.into());
        self
    }

    /// Makes `stop` fail with the given message.
    pub fn with_stop_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_stop = Some(message.into());
        self
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Default for MockCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MockCaptureSource {
    fn start(&mut self, sink: FrameSink) -> Result<()> {
        if let Some(message) = &self.fail_start {
            return Err(crate::error::SpeechRelayError::Capture {
                message: message.clone(),
            });
        }
        for frame in self.frames.drain(..) {
            sink.push_frame(frame);
        }
        self.sink = Some(sink);
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(message) = &self.fail_stop {
            return Err(crate::error::SpeechRelayError::Stop {
                message: message.clone(),
            });
        }
        self.sink = None;
        self.started = false;
        Ok(())
    }
}
