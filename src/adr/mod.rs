//! # Adverse Drug Reaction Screening
//!
//! Flags drugs mentioned in a dictation transcript against a public
//! drug-label registry:
//!
//! - **registry**: the `DrugLabelRegistry` seam plus the openFDA client
//! - **engine**: candidate extraction via the generative model, then
//!   per-candidate validation with case-insensitive dedup
//!
//! Faults are contained per candidate: one bad registry call or one garbled
//! model answer never aborts the screening request.

pub mod engine;
pub mod registry;

pub use engine::{AdrAlert, ScreeningEngine};
pub use registry::{DrugLabelRegistry, LabelHit, OpenFdaClient};
