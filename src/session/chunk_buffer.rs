//! Byte accumulator that packetizes normalized PCM into fixed-size chunks.
//!
//! Bytes go in per frame; whole chunks come out once the soft threshold is
//! reached. The buffer itself has no notion of time or dispatch state; the
//! pipeline decides when to extract based on dispatcher availability.

use crate::defaults;
use crate::session::frame::PcmChunk;

/// Accumulates normalized PCM bytes and cuts them into dispatch-ready chunks.
#[derive(Debug)]
pub struct ChunkBuffer {
    pending: Vec<u8>,
    /// Soft threshold in bytes: one chunk's worth of audio.
    threshold: usize,
    /// Hard cap in bytes before a chunk must be forced out.
    hard_cap: usize,
    next_sequence: u64,
}

impl ChunkBuffer {
    /// Creates a buffer from durations in seconds at the given sample rate.
    pub fn new(chunk_secs: u32, max_secs: u32, sample_rate: u32) -> Self {
        let bytes_per_sec = sample_rate as usize * defaults::BYTES_PER_SAMPLE;
        Self {
            pending: Vec::new(),
            threshold: chunk_secs as usize * bytes_per_sec,
            hard_cap: max_secs as usize * bytes_per_sec,
            next_sequence: 0,
        }
    }

    /// Chunk size in bytes.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Appends normalized PCM bytes without extracting anything.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Appends bytes, then extracts a chunk if the threshold is reached.
    pub fn append(&mut self, bytes: &[u8]) -> Option<PcmChunk> {
        self.push(bytes);
        self.take_ready()
    }

    /// Extracts exactly one threshold-sized chunk if enough is buffered.
    ///
    /// Bytes beyond the threshold stay in the buffer for the next chunk, so
    /// no audio is lost at chunk boundaries.
    pub fn take_ready(&mut self) -> Option<PcmChunk> {
        if self.pending.len() < self.threshold || self.threshold == 0 {
            return None;
        }
        let remainder = self.pending.split_off(self.threshold);
        let bytes = std::mem::replace(&mut self.pending, remainder);
        Some(self.make_chunk(bytes, false))
    }

    /// True once the buffer has hit the hard cap and a chunk must be forced.
    pub fn at_hard_cap(&self) -> bool {
        self.pending.len() >= self.hard_cap
    }

    /// Drains the remainder as a final chunk, or None if nothing is buffered.
    ///
    /// The remainder is trimmed to an even length so the final chunk holds
    /// whole 16-bit samples. A lone trailing byte is discarded.
    pub fn flush(&mut self) -> Option<PcmChunk> {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.len() % 2 == 1 {
            bytes.pop();
        }
        if bytes.is_empty() {
            return None;
        }
        Some(self.make_chunk(bytes, true))
    }

    /// Discards buffered bytes and resets sequence numbering.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_sequence = 0;
    }

    fn make_chunk(&mut self, bytes: Vec<u8>, is_final: bool) -> PcmChunk {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        PcmChunk {
            sequence,
            bytes,
            is_final,
        }
    }
}
