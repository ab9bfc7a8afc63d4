//! PCM normalization: capture frames to 16kHz mono 16-bit LE bytes.
//!
//! Multi-channel frames are reduced to their first channel. Rate conversion
//! is nearest-neighbor with no interpolation or anti-aliasing filter, which
//! is good enough for speech recognition payloads.

use crate::defaults;
use crate::session::frame::RawFrame;

/// Stateless converter from raw capture frames to normalized PCM bytes.
#[derive(Debug, Clone)]
pub struct PcmNormalizer {
    target_rate: u32,
}

impl PcmNormalizer {
    /// Creates a normalizer for the default 16kHz target rate.
    pub fn new() -> Self {
        Self::with_target_rate(defaults::SAMPLE_RATE)
    }

    /// Creates a normalizer for a custom target rate.
    pub fn with_target_rate(target_rate: u32) -> Self {
        Self { target_rate }
    }

    /// Target sample rate of the normalized output.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Converts one frame to 16-bit little-endian mono PCM at the target rate.
    ///
    /// Zero-channel or zero-length frames yield an empty buffer, not an
    /// error. Output length is always an even number of bytes.
    pub fn normalize(&self, frame: &RawFrame) -> Vec<u8> {
        if frame.channels == 0 || frame.samples.is_empty() || self.target_rate == 0 {
            return Vec::new();
        }

        let step = frame.channels as usize;
        let frame_len = frame.len();

        if frame.sample_rate == self.target_rate {
            let mut out = Vec::with_capacity(frame_len * 2);
            for sample in frame.samples.iter().step_by(step) {
                out.extend_from_slice(&to_i16(*sample).to_le_bytes());
            }
            return out;
        }

        if frame.sample_rate == 0 {
            return Vec::new();
        }

        // Nearest-neighbor resampling: output index i maps back to source
        // index floor(i * src / target); out-of-range indices are skipped.
        let out_len =
            (frame_len as u64 * self.target_rate as u64 / frame.sample_rate as u64) as usize;
        let mut out = Vec::with_capacity(out_len * 2);
        for i in 0..out_len {
            let src = (i as u64 * frame.sample_rate as u64 / self.target_rate as u64) as usize;
            if src < frame_len {
                out.extend_from_slice(&to_i16(frame.samples[src * step]).to_le_bytes());
            }
        }
        out
    }
}

impl Default for PcmNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale a normalized float sample to a 16-bit integer, clamped.
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// RMS sound level in dB over normalized samples in [-1, 1].
///
/// The RMS is floored at 1e-5 before the log, so silence reports -100 dB
/// rather than `-inf` or NaN.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return defaults::DB_FLOOR;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let s = s.clamp(-1.0, 1.0) as f64;
            s * s
        })
        .sum();
    let rms = (sum / samples.len() as f64).sqrt().max(defaults::RMS_FLOOR);
    (20.0 * rms.log10()) as f32
}

/// Sound level of one capture frame, measured on its first channel.
pub fn sound_level_db(frame: &RawFrame) -> f32 {
    if frame.channels == 0 {
        return defaults::DB_FLOOR;
    }
    if frame.channels == 1 {
        return rms_db(&frame.samples);
    }
    let first_channel: Vec<f32> = frame
        .samples
        .iter()
        .step_by(frame.channels as usize)
        .copied()
        .collect();
    rms_db(&first_channel)
}
