//! # PCM Frame Validation
//!
//! Checks incoming audio frames against the fixed session format before they
//! are forwarded to the streaming recognizer, and provides a cheap level
//! meter for debug logging.

use crate::config::AudioConfig;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Fixed per-session audio format, derived from configuration.
#[derive(Debug, Clone)]
pub struct FrameSpec {
    /// Expected sample rate in Hz
    pub sample_rate: u32,

    /// Expected channel count
    pub channels: u8,

    /// Expected bit depth
    pub bit_depth: u8,

    /// Upper bound on a single frame, in bytes
    pub max_frame_bytes: usize,
}

impl FrameSpec {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            bit_depth: config.bit_depth,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Validate a single incoming audio frame.
    ///
    /// ## Validation Checks:
    /// 1. **Non-empty**: empty frames are the end-of-stream sentinel and
    ///    must not reach validation
    /// 2. **Even length**: 16-bit samples occupy two bytes each
    /// 3. **Bounded size**: oversized frames indicate a misbehaving client
    pub fn validate_frame(&self, data: &[u8]) -> Result<(), String> {
        if data.is_empty() {
            return Err("Audio frame is empty".to_string());
        }

        if data.len() % 2 != 0 {
            return Err("Audio frame length must be even for 16-bit samples".to_string());
        }

        if data.len() > self.max_frame_bytes {
            return Err(format!(
                "Audio frame of {} bytes exceeds the {} byte limit",
                data.len(),
                self.max_frame_bytes
            ));
        }

        Ok(())
    }

    /// Approximate duration of a frame at this spec, in milliseconds.
    pub fn frame_duration_ms(&self, data: &[u8]) -> u64 {
        let samples = data.len() as u64 / 2;
        let per_channel = samples / self.channels.max(1) as u64;
        per_channel * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Peak absolute amplitude of a PCM frame.
///
/// Used for debug-level level metering on the relay; a run of zero peaks
/// usually means the client's microphone path is producing silence.
pub fn peak_amplitude(data: &[u8]) -> i16 {
    let mut cursor = Cursor::new(data);
    let mut peak: i16 = 0;

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        peak = peak.max(sample.saturating_abs());
    }

    peak
}
