//! # Consultation Note Structuring
//!
//! Turns a raw dictation transcript into an editable structured draft:
//!
//! - **prompt**: the fixed instruction template sent to the generative model
//! - **parser**: deterministic heading-anchored parse of the model's free
//!   text into [`ConsultationDraft`]
//! - **engine**: orchestration, sentinel short-circuits and failure markers
//!
//! Parsing is best-effort by design; the unparsed model text always travels
//! alongside the derived structure so the doctor can correct mis-extraction
//! against the original.

pub mod engine;
pub mod parser;
pub mod prompt;

pub use engine::{ExtractionEngine, ExtractionOutcome, ANALYSIS_FAILED_MARKER, PLACEHOLDER_TRANSCRIPT};
pub use parser::{ConsultationDraft, PrescriptionItem};
