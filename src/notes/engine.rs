//! # Narrative Extraction Engine
//!
//! Orchestrates one transcript → structured draft extraction:
//! sentinel short-circuit, generative call, deterministic parse. The engine
//! never returns a half-populated draft from a failed call — a failure is an
//! explicit marker the caller must render as a failure state.

use crate::llm::{Completion, TextGenerator};
use crate::notes::parser::{parse_draft, ConsultationDraft};
use crate::notes::prompt::consultation_prompt;
use tracing::{debug, info, warn};

/// Placeholder the dictation UI shows before any transcript exists; treated
/// the same as an empty transcript.
pub const PLACEHOLDER_TRANSCRIPT: &str = "(Listening...)";

/// Marker returned when the model declined or produced no usable text.
pub const ANALYSIS_FAILED_MARKER: &str = "(AI analysis failed or was blocked)";

/// Result of one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Structured draft plus the unparsed model text kept for audit and
    /// correction against mis-extraction
    Draft {
        draft: ConsultationDraft,
        original_text: String,
    },

    /// The call failed as a whole; `marker` is the string the UI must
    /// detect in place of the structured object
    Failed { marker: String },
}

/// Extraction engine over any generative text backend.
///
/// Stateless across calls: concurrent extractions for different transcripts
/// share nothing but the underlying HTTP client.
pub struct ExtractionEngine<G> {
    generator: G,
}

impl<G: TextGenerator> ExtractionEngine<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Extract a structured draft from a raw dictation transcript.
    ///
    /// ## Short-circuits:
    /// An empty transcript or the listening placeholder yields the all-empty
    /// draft without touching the backend.
    ///
    /// ## Failure handling:
    /// A blocked/empty completion or a transport fault aborts only this
    /// extraction and comes back as `ExtractionOutcome::Failed`.
    pub async fn extract(&self, transcript: &str) -> ExtractionOutcome {
        let trimmed = transcript.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER_TRANSCRIPT {
            debug!("No usable transcript, returning empty draft without a model call");
            return ExtractionOutcome::Draft {
                draft: ConsultationDraft::default(),
                original_text: String::new(),
            };
        }

        info!("Extracting structured note from {} chars of transcript", transcript.len());
        let prompt = consultation_prompt(transcript);

        match self.generator.generate(&prompt).await {
            Ok(Completion::Text(text)) => {
                let draft = parse_draft(&text);
                debug!(
                    "Extraction parsed {} prescription entries",
                    draft.prescription_details.len()
                );
                ExtractionOutcome::Draft {
                    draft,
                    original_text: text,
                }
            }
            Ok(Completion::Blocked) => {
                warn!("Model response was blocked or empty");
                ExtractionOutcome::Failed {
                    marker: ANALYSIS_FAILED_MARKER.to_string(),
                }
            }
            Err(err) => {
                warn!("Extraction model call failed: {:#}", err);
                ExtractionOutcome::Failed {
                    marker: format!("(AI processing failed: {})", err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted generator that counts calls.
    struct ScriptedGenerator {
        response: Result<Completion, String>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedGenerator {
        fn new(response: Result<Completion, String>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    response,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(completion) => Ok(completion.clone()),
                Err(message) => Err(anyhow::anyhow!("{}", message)),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_backend() {
        let (generator, calls) = ScriptedGenerator::new(Ok(Completion::Text("x".into())));
        let engine = ExtractionEngine::new(generator);

        let outcome = engine.extract("").await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Draft {
                draft: ConsultationDraft::default(),
                original_text: String::new(),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_placeholder_transcript_skips_backend() {
        let (generator, calls) = ScriptedGenerator::new(Ok(Completion::Text("x".into())));
        let engine = ExtractionEngine::new(generator);

        let outcome = engine.extract("(Listening...)").await;
        assert!(matches!(outcome, ExtractionOutcome::Draft { draft, .. } if draft == ConsultationDraft::default()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blocked_completion_returns_marker() {
        let (generator, _) = ScriptedGenerator::new(Ok(Completion::Blocked));
        let engine = ExtractionEngine::new(generator);

        let outcome = engine.extract("patient has fever").await;
        assert_eq!(
            outcome,
            ExtractionOutcome::Failed {
                marker: ANALYSIS_FAILED_MARKER.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_transport_fault_returns_marker_not_partial_draft() {
        let (generator, _) = ScriptedGenerator::new(Err("connection reset".to_string()));
        let engine = ExtractionEngine::new(generator);

        let outcome = engine.extract("patient has fever").await;
        match outcome {
            ExtractionOutcome::Failed { marker } => {
                assert!(marker.starts_with("(AI processing failed:"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_extraction_keeps_original_text() {
        let response = "\
Chief Complaints: Fever
Clinical Findings: None mentioned
Internal Notes: None mentioned
Diagnosis: Viral fever
Procedures Conducted: None mentioned
Prescription:
Tab Paracetamol | 500mg | twice daily for 5 days
Investigations: None mentioned
Advice Given: Hydration and rest
Follow-Up Date: In 1 week
";
        let (generator, calls) =
            ScriptedGenerator::new(Ok(Completion::Text(response.to_string())));
        let engine = ExtractionEngine::new(generator);

        let transcript = "Patient has fever. Prescribe Paracetamol 500mg twice daily for 5 days. \
Follow up in 1 week.";
        let outcome = engine.extract(transcript).await;

        match outcome {
            ExtractionOutcome::Draft {
                draft,
                original_text,
            } => {
                assert_eq!(calls.load(Ordering::SeqCst), 1);
                assert_eq!(original_text, response);
                assert!(!draft.chief_complaints.is_empty() || !draft.diagnosis.is_empty());
                assert_eq!(draft.prescription_details.len(), 1);
                assert_eq!(draft.prescription_details[0].medicine, "Tab Paracetamol");
                assert_eq!(draft.follow_up_date, "In 1 week");
                // Sentinel sections normalized, not copied through
                assert_eq!(draft.clinical_findings, "");
            }
            other => panic!("expected draft, got {:?}", other),
        }
    }
}
