//! Audio chunk and stream-format types.

use chrono::{DateTime, Utc};

/// Capture format shared by the backend, the chunker and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per emitted chunk.
    pub chunk_size: usize,
}

impl AudioSpec {
    /// Interleaved samples per chunk.
    pub fn samples_per_chunk(&self) -> usize {
        self.chunk_size * self.channels as usize
    }

    /// Wall-clock length of one chunk in seconds.
    pub fn chunk_period_secs(&self) -> f64 {
        self.chunk_size as f64 / self.sample_rate as f64
    }
}

/// A fixed-size block of captured samples.
///
/// Produced by the capture worker; consumers receive their own copy and the
/// worker keeps appending to the session waveform independently.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved f32 samples. The final chunk of a capture may be
    /// zero-padded up to a whole frame boundary.
    pub samples: Vec<f32>,
    /// Monotonically increasing within one capture, starting at 0.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}
