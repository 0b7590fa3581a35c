//! # Audio Frame Handling
//!
//! Validation and inspection of the raw PCM frames dictation clients send
//! over `/live_transcript`.
//!
//! ## Audio Format Requirements:
//! - **Sample Rate**: 48 kHz (what browser capture delivers)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers
//!
//! Frames are relayed to the recognizer immediately; nothing here buffers or
//! batches audio. An empty frame is the client's end-of-stream sentinel and
//! is handled by the relay, not by validation.

pub mod frame;

pub use frame::{peak_amplitude, FrameSpec};
