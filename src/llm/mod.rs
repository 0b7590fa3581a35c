//! # Generative Text Backend
//!
//! The `TextGenerator` seam hides the concrete generative model behind a
//! single prompt-in / completion-out call. Both the narrative extraction
//! engine and the ADR screening engine depend on this trait, never on the
//! HTTP client directly, so tests run against scripted fakes.
//!
//! `Completion::Blocked` is a first-class outcome, not an error: a safety
//! block or an empty candidate list means the call worked but produced no
//! usable text, and callers handle that distinctly from transport failures.

pub mod gemini;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiClient;

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Usable model text
    Text(String),

    /// The model declined or returned nothing (safety block, empty output)
    Blocked,
}

/// Prompt-in, completion-out text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Completion>;
}
