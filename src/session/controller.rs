//! Session controller: lifecycle, pipeline task, and dispatch task.
//!
//! `start` wires the capture source into two tokio tasks. The pipeline task
//! normalizes frames, meters sound level, and packetizes PCM into chunks.
//! The dispatch task sends chunks to the recognizer one at a time. `stop`
//! flushes the remainder and drains both tasks before returning.

use crate::audio::capture::{CaptureSource, FrameSink};
use crate::audio::normalizer::{sound_level_db, PcmNormalizer};
use crate::config::{Config, StartPolicy};
use crate::defaults;
use crate::error::{Result, SpeechRelayError};
use crate::session::chunk_buffer::ChunkBuffer;
use crate::session::frame::{
    ControlEvent, PcmChunk, PipelineFrame, SessionEvent, SessionState, Transcript,
};
use crate::stt::recognizer::Recognizer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Drives one recognition session from capture to transcripts.
///
/// Lifecycle is `Idle -> Listening -> Stopping -> Idle`. Dispatch failures
/// are reported as events and never tear the session down.
pub struct SessionController {
    config: Config,
    capture: Box<dyn CaptureSource>,
    recognizer: Arc<dyn Recognizer>,
    state: Arc<Mutex<SessionState>>,
    event_tx: mpsc::Sender<SessionEvent>,
    frame_tx: Option<mpsc::Sender<PipelineFrame>>,
    pipeline: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Creates a controller and the event stream callers consume.
    pub fn new(
        config: Config,
        capture: Box<dyn CaptureSource>,
        recognizer: Arc<dyn Recognizer>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(defaults::EVENT_CHANNEL_CAPACITY);
        let controller = Self {
            config,
            capture,
            recognizer,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            event_tx,
            frame_tx: None,
            pipeline: None,
            dispatcher: None,
        };
        (controller, event_rx)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// True while the session is capturing.
    pub fn is_listening(&self) -> bool {
        self.state() == SessionState::Listening
    }

    /// Starts capture and recognition.
    ///
    /// Repeated calls while listening follow the configured start policy.
    /// Validation or capture failures leave the session idle.
    pub fn start(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Listening => {
                return match self.config.session.start_policy {
                    StartPolicy::Idempotent => {
                        debug!("start while listening, treating as no-op");
                        Ok(())
                    }
                    StartPolicy::Strict => Err(SpeechRelayError::AlreadyListening),
                };
            }
            SessionState::Stopping => {
                return Err(SpeechRelayError::Start {
                    message: "session is stopping".to_string(),
                });
            }
            SessionState::Idle => {}
        }

        self.config.validate()?;

        let (frame_tx, frame_rx) = mpsc::channel(self.config.audio.frame_channel_capacity);
        // Capacity 1: at most one chunk waits behind the in-flight dispatch.
        let (chunk_tx, chunk_rx) = mpsc::channel::<PcmChunk>(1);
        let busy = Arc::new(AtomicBool::new(false));

        self.capture.start(FrameSink::new(frame_tx.clone()))?;

        let normalizer = PcmNormalizer::with_target_rate(self.config.recognition.sample_rate_hertz);
        let buffer = ChunkBuffer::new(
            self.config.session.chunk_duration_secs,
            self.config.session.max_duration_secs,
            self.config.recognition.sample_rate_hertz,
        );

        self.pipeline = Some(tokio::spawn(run_pipeline(
            frame_rx,
            chunk_tx,
            self.event_tx.clone(),
            busy.clone(),
            normalizer,
            buffer,
            self.config.session.emit_audio,
        )));
        self.dispatcher = Some(tokio::spawn(run_dispatcher(
            chunk_rx,
            self.recognizer.clone(),
            self.event_tx.clone(),
            busy,
            self.config.recognition.sample_rate_hertz,
        )));
        self.frame_tx = Some(frame_tx);

        *lock(&self.state) = SessionState::Listening;
        info!(
            recognizer = self.recognizer.name(),
            language = %self.config.recognition.language_code,
            "session started"
        );
        Ok(())
    }

    /// Stops capture, flushes buffered audio, and drains in-flight dispatch.
    ///
    /// Idempotent: stopping an idle session is a no-op. A capture release
    /// failure is returned after the pipeline has still been drained.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state() == SessionState::Idle {
            return Ok(());
        }
        *lock(&self.state) = SessionState::Stopping;

        let capture_result = self.capture.stop();

        if let Some(frame_tx) = self.frame_tx.take() {
            let _ = frame_tx
                .send(PipelineFrame::Control(ControlEvent::Shutdown))
                .await;
        }
        // Pipeline exits after the flush chunk, dropping its chunk sender;
        // the dispatcher then drains and exits on its own.
        if let Some(handle) = self.pipeline.take() {
            if handle.await.is_err() {
                error!("pipeline task panicked during shutdown");
            }
        }
        if let Some(handle) = self.dispatcher.take() {
            if handle.await.is_err() {
                error!("dispatch task panicked during shutdown");
            }
        }

        *lock(&self.state) = SessionState::Idle;
        info!("session stopped");
        capture_result
    }
}

/// Normalizes frames, meters levels, and packetizes chunks.
async fn run_pipeline(
    mut frame_rx: mpsc::Receiver<PipelineFrame>,
    chunk_tx: mpsc::Sender<PcmChunk>,
    event_tx: mpsc::Sender<SessionEvent>,
    busy: Arc<AtomicBool>,
    normalizer: PcmNormalizer,
    mut buffer: ChunkBuffer,
    emit_audio: bool,
) {
    loop {
        let frame = match frame_rx.recv().await {
            Some(PipelineFrame::Audio(frame)) => frame,
            Some(PipelineFrame::CaptureError(message)) => {
                warn!(%message, "capture reported an error");
                emit(&event_tx, SessionEvent::Error(message));
                continue;
            }
            Some(PipelineFrame::Control(ControlEvent::Shutdown)) | None => break,
        };

        emit(&event_tx, SessionEvent::SoundLevel(sound_level_db(&frame)));

        let bytes = normalizer.normalize(&frame);
        if bytes.is_empty() {
            continue;
        }
        if emit_audio {
            emit(&event_tx, SessionEvent::Audio(bytes.clone()));
        }
        buffer.push(&bytes);

        if buffer.at_hard_cap() {
            // Recognition has fallen behind capture. Force the chunk out
            // rather than growing the buffer without bound.
            if busy.load(Ordering::Acquire) {
                warn!(
                    buffered = buffer.buffered_bytes(),
                    "recognition is behind capture, forcing a chunk"
                );
                emit(
                    &event_tx,
                    SessionEvent::Warning("recognition is behind capture".to_string()),
                );
            }
            if let Some(chunk) = buffer.take_ready() {
                if chunk_tx.send(chunk).await.is_err() {
                    break;
                }
            }
        } else if !busy.load(Ordering::Acquire) {
            if let Some(chunk) = buffer.take_ready() {
                if chunk_tx.send(chunk).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(chunk) = buffer.flush() {
        debug!(bytes = chunk.bytes.len(), "dispatching final chunk");
        let _ = chunk_tx.send(chunk).await;
    }
}

/// Sends chunks to the recognizer, strictly one at a time.
async fn run_dispatcher(
    mut chunk_rx: mpsc::Receiver<PcmChunk>,
    recognizer: Arc<dyn Recognizer>,
    event_tx: mpsc::Sender<SessionEvent>,
    busy: Arc<AtomicBool>,
    sample_rate: u32,
) {
    while let Some(chunk) = chunk_rx.recv().await {
        busy.store(true, Ordering::Release);
        debug!(
            sequence = chunk.sequence,
            duration_ms = chunk.duration_ms(sample_rate),
            is_final = chunk.is_final,
            "dispatching chunk"
        );
        match recognizer.recognize(&chunk.bytes).await {
            Ok(Some(text)) => {
                emit(
                    &event_tx,
                    SessionEvent::Transcript(Transcript {
                        text,
                        is_final: chunk.is_final,
                    }),
                );
            }
            Ok(None) => {
                debug!(sequence = chunk.sequence, "no speech in chunk");
            }
            Err(e) => {
                warn!(sequence = chunk.sequence, error = %e, "dispatch failed");
                emit(&event_tx, SessionEvent::Error(e.to_string()));
            }
        }
        busy.store(false, Ordering::Release);
    }
}

/// Fire-and-forget event delivery; a slow consumer loses events, never
/// stalls the pipeline.
fn emit(event_tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    let _ = event_tx.try_send(event);
}

fn lock(state: &Mutex<SessionState>) -> std::sync::MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::MockCaptureSource;
    use crate::session::frame::RawFrame;
    use crate::stt::recognizer::{DispatchError, MockRecognizer};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.recognition.access_token = "test-token".to_string();
        config
    }

    fn frames_of(total_samples: usize, per_frame: usize) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        let mut remaining = total_samples;
        while remaining > 0 {
            let n = remaining.min(per_frame);
            frames.push(RawFrame::mono(vec![0.1; n], 16000));
            remaining -= n;
        }
        frames
    }

    async fn drain(mut rx: mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_start_requires_token() {
        let config = Config::default();
        let (mut controller, _events) = SessionController::new(
            config,
            Box::new(MockCaptureSource::new()),
            Arc::new(MockRecognizer::new()),
        );
        assert_eq!(controller.start().unwrap_err().code(), "INVALID_TOKEN");
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_capture_failure_leaves_session_idle() {
        let (mut controller, _events) = SessionController::new(
            test_config(),
            Box::new(MockCaptureSource::new().with_start_failure("no device")),
            Arc::new(MockRecognizer::new()),
        );
        assert_eq!(controller.start().unwrap_err().code(), "START_ERROR");
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_idempotent_restart_is_noop() {
        let (mut controller, _events) = SessionController::new(
            test_config(),
            Box::new(MockCaptureSource::new()),
            Arc::new(MockRecognizer::new()),
        );
        controller.start().unwrap();
        controller.start().unwrap();
        assert!(controller.is_listening());
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_restart_is_rejected() {
        let mut config = test_config();
        config.session.start_policy = StartPolicy::Strict;
        let (mut controller, _events) = SessionController::new(
            config,
            Box::new(MockCaptureSource::new()),
            Arc::new(MockRecognizer::new()),
        );
        controller.start().unwrap();
        assert_eq!(
            controller.start().unwrap_err().code(),
            "ALREADY_LISTENING"
        );
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (mut controller, _events) = SessionController::new(
            test_config(),
            Box::new(MockCaptureSource::new()),
            Arc::new(MockRecognizer::new()),
        );
        controller.stop().await.unwrap();
        controller.start().unwrap();
        controller.stop().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_full_session_chunks_then_flushes() {
        // 3.5s of audio at 16kHz: one full 96000-byte chunk, then a
        // 16000-byte flush remainder.
        let capture =
            MockCaptureSource::new().with_frames(frames_of(56_000, 3_500));
        let recognizer = Arc::new(
            MockRecognizer::new()
                .with_response("hello")
                .with_response("world"),
        );
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            recognizer.clone(),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        assert_eq!(recognizer.calls(), vec![96_000, 16_000]);

        let events = drain(events).await;
        let transcripts: Vec<Transcript> = events
            .into_iter()
            .filter_map(SessionEvent::into_transcript)
            .collect();
        assert_eq!(transcripts.len(), 2);
        assert_eq!(transcripts[0].text, "hello");
        assert!(!transcripts[0].is_final);
        assert_eq!(transcripts[1].text, "world");
        assert!(transcripts[1].is_final);
    }

    #[tokio::test]
    async fn test_short_session_flushes_remainder_only() {
        // Half a second of audio never reaches the chunk threshold; stop
        // must still dispatch it.
        let capture = MockCaptureSource::new().with_frames(frames_of(8_000, 1_600));
        let recognizer = Arc::new(MockRecognizer::new().with_response("short"));
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            recognizer.clone(),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        assert_eq!(recognizer.calls(), vec![16_000]);
        let transcripts: Vec<Transcript> = drain(events)
            .await
            .into_iter()
            .filter_map(SessionEvent::into_transcript)
            .collect();
        assert_eq!(transcripts.len(), 1);
        assert!(transcripts[0].is_final);
    }

    #[tokio::test]
    async fn test_stop_failure_still_flushes_remainder() {
        // A wedged capture device must not lose already-captured audio: the
        // remainder is flushed and transcribed, then the failure surfaces.
        let capture = MockCaptureSource::new()
            .with_frames(frames_of(8_000, 1_600))
            .with_stop_failure("device wedged");
        let recognizer = Arc::new(MockRecognizer::new().with_response("tail"));
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            recognizer.clone(),
        );

        controller.start().unwrap();
        let err = controller.stop().await.unwrap_err();
        assert_eq!(err.code(), "STOP_ERROR");
        assert_eq!(controller.state(), SessionState::Idle);

        assert_eq!(recognizer.calls(), vec![16_000]);
        let transcripts: Vec<Transcript> = drain(events)
            .await
            .into_iter()
            .filter_map(SessionEvent::into_transcript)
            .collect();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].text, "tail");
        assert!(transcripts[0].is_final);
    }

    #[tokio::test]
    async fn test_silent_session_dispatches_nothing() {
        let capture = MockCaptureSource::new();
        let recognizer = Arc::new(MockRecognizer::new());
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            recognizer.clone(),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        assert!(recognizer.calls().is_empty());
        assert!(drain(events).await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_error_is_nonfatal() {
        let capture = MockCaptureSource::new().with_frames(frames_of(56_000, 3_500));
        let recognizer = Arc::new(
            MockRecognizer::new()
                .with_failure(DispatchError::Api {
                    code: 401,
                    message: "bad token".to_string(),
                })
                .with_response("still works"),
        );
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            recognizer.clone(),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        // Both chunks were dispatched despite the first failing.
        assert_eq!(recognizer.calls(), vec![96_000, 16_000]);

        let events = drain(events).await;
        assert!(events.iter().any(|e| e.is_error()));
        let transcripts: Vec<Transcript> = events
            .into_iter()
            .filter_map(SessionEvent::into_transcript)
            .collect();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].text, "still works");
    }

    #[tokio::test]
    async fn test_sound_levels_are_emitted() {
        let capture = MockCaptureSource::new().with_frames(frames_of(3_200, 1_600));
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(capture),
            Arc::new(MockRecognizer::new()),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        let levels: Vec<f32> = drain(events)
            .await
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::SoundLevel(db) => Some(db),
                _ => None,
            })
            .collect();
        assert_eq!(levels.len(), 2);
        for db in levels {
            assert!(db.is_finite());
            assert!(db <= 0.0 && db >= -100.0);
        }
    }

    #[tokio::test]
    async fn test_emit_audio_forwards_pcm_bytes() {
        let mut config = test_config();
        config.session.emit_audio = true;
        let capture = MockCaptureSource::new().with_frames(frames_of(1_600, 1_600));
        let (mut controller, events) = SessionController::new(
            config,
            Box::new(capture),
            Arc::new(MockRecognizer::new()),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();

        let audio: Vec<Vec<u8>> = drain(events)
            .await
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Audio(bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].len(), 3_200);
    }

    #[tokio::test]
    async fn test_capture_error_becomes_event() {
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(MockCaptureSource::new()),
            Arc::new(MockRecognizer::new()),
        );
        controller.start().unwrap();
        if let Some(tx) = controller.frame_tx.clone() {
            tx.send(PipelineFrame::CaptureError("stream died".to_string()))
                .await
                .unwrap();
        }
        controller.stop().await.unwrap();

        let events = drain(events).await;
        assert!(events.iter().any(|e| e.is_error()));
    }

    #[tokio::test]
    async fn test_session_can_restart_after_stop() {
        let recognizer = Arc::new(MockRecognizer::new().with_response("again"));
        let (mut controller, events) = SessionController::new(
            test_config(),
            Box::new(MockCaptureSource::new()),
            recognizer.clone(),
        );

        controller.start().unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);

        controller.start().unwrap();
        assert!(controller.is_listening());
        controller.stop().await.unwrap();
        drop(events);
    }
}
