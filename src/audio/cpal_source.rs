//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::capture::{CaptureSource, FrameSink};
use crate::defaults;
use crate::error::{Result, SpeechRelayError};
use crate::session::frame::RawFrame;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
/// (stderr). Safe as long as no other thread is concurrently manipulating
/// fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Quiet the JACK/ALSA/PipeWire probing chatter.
///
/// # Safety
/// Modifies environment variables, which is safe when called at startup
/// before any threads are spawned.
pub fn suppress_audio_warnings() {
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for GNOME/PipeWire environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for voice input.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List usable audio input devices, preferred ones marked `[recommended]`.
///
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| SpeechRelayError::Capture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio over
/// raw ALSA devices so GNOME's device selection is respected.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if is_preferred_device(&name) {
                        return Ok(device);
                    }
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| SpeechRelayError::PermissionDenied {
                message: "no default input device".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is owned by the capture source, which only touches it
/// from `start`/`stop` under `&mut self`. It never crosses threads while a
/// method call is in flight.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture that pushes f32 frames into the pipeline.
///
/// Tries the preferred format first (f32/16kHz/mono); if the device rejects
/// it, falls back to the device's native config and lets the downstream
/// normalizer handle channel reduction and resampling.
pub struct CpalCaptureSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
}

impl CpalCaptureSource {
    /// Opens a capture source on the named device, or the best default.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| SpeechRelayError::Capture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                for dev in devices {
                    if dev.name().is_ok_and(|n| n == name) {
                        return Ok(dev);
                    }
                }
                Err(SpeechRelayError::Capture {
                    message: format!("Input device not found: {}", name),
                })
            } else {
                get_best_default_device()
            }
        })?;

        Ok(Self {
            device,
            stream: None,
        })
    }

    fn build_stream(&self, sink: FrameSink) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: defaults::SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };

        let err_sink = sink.clone();
        let err_callback = move |err| {
            err_sink.push_error(format!("Audio stream error: {}", err));
        };

        // Preferred path: f32/16kHz/mono, which PipeWire/PulseAudio convert
        // to transparently.
        let data_sink = sink.clone();
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                data_sink.push_frame(RawFrame::mono(data.to_vec(), defaults::SAMPLE_RATE));
            },
            err_callback.clone(),
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at the device's native config. Some
        // PipeWire-ALSA setups accept non-native configs but never deliver
        // data, so downstream conversion is the reliable path.
        self.build_stream_native(sink, err_callback)
    }

    fn build_stream_native(
        &self,
        sink: FrameSink,
        err_callback: impl FnMut(cpal::StreamError) + Send + Clone + 'static,
    ) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| SpeechRelayError::Capture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels();
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        info!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "using native audio format, converting downstream"
        );

        match default_config.sample_format() {
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        sink.push_frame(RawFrame {
                            samples: data.to_vec(),
                            sample_rate: native_rate,
                            channels: native_channels,
                        });
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SpeechRelayError::Capture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let samples: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        sink.push_frame(RawFrame {
                            samples,
                            sample_rate: native_rate,
                            channels: native_channels,
                        });
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SpeechRelayError::Capture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            fmt => Err(SpeechRelayError::Capture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a different device.",
                    fmt
                ),
            }),
        }
    }
}

impl CaptureSource for CpalCaptureSource {
    fn start(&mut self, sink: FrameSink) -> Result<()> {
        if self.stream.is_some() {
            return Ok(()); // Already capturing
        }

        let stream = self.build_stream(sink)?;
        stream.play().map_err(|e| SpeechRelayError::Capture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.0.pause() {
                warn!(error = %e, "failed to pause audio stream, dropping it");
            }
        }
        Ok(())
    }
}
