//! # Live Speech Pipeline
//!
//! Everything between a dictating clinician's browser and the streaming
//! speech recognizer:
//!
//! - **types**: recognition events and per-session recognizer configuration
//! - **backend**: the `SpeechBackend` seam plus the WebSocket streaming client
//! - **protocol**: the typed text-line protocol sent back to the client
//! - **relay**: the per-connection actor bridging the two sides
//!
//! ## Data Flow:
//! client binary PCM frames → relay → recognizer stream → recognition events
//! → relay → `FINAL:` / `INTERIM:` / `STATUS:` / `ERROR:` lines → client

pub mod backend;
pub mod protocol;
pub mod relay;
pub mod types;

pub use backend::{SpeechBackend, StreamingSttClient};
pub use protocol::{ClientLine, EventRelay};
pub use types::{RecognitionConfig, RecognitionEvent};
