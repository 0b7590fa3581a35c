//! # ADR Screening Engine
//!
//! Two-step screening of a dictation transcript:
//!
//! 1. **Candidate extraction**: ask the generative model for a JSON array of
//!    drug names it can infer from the (possibly STT-garbled) transcript.
//!    The answer is untrusted input — code fences are stripped and anything
//!    that is not a list of strings collapses to no candidates.
//! 2. **Validation**: each distinct candidate (case-insensitive) is checked
//!    against the label registry; a match produces one alert.
//!
//! The engine itself is infallible: every fault is contained to the
//! candidate it affects and logged, never surfaced to the caller.

use crate::adr::registry::DrugLabelRegistry;
use crate::llm::{Completion, TextGenerator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Minimum whitespace-separated tokens before screening is meaningful.
const MIN_TRANSCRIPT_TOKENS: usize = 10;

/// Placeholder symptom attached to every alert: the registry match itself is
/// the evidence, no label text is extracted in this version.
const REGISTRY_MATCH_SYMPTOM: &str = "Listed in drug label registry";

/// One validated alert shown to the doctor in real time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdrAlert {
    pub drug: String,
    pub symptom: String,
}

/// Screening engine over a generative model and a label registry.
///
/// Stateless across calls; the per-call seen-set is the only working state,
/// so concurrent screenings of different transcripts cannot interfere.
pub struct ScreeningEngine<G, R> {
    generator: G,
    registry: R,
}

/// Build the candidate-extraction prompt with the transcript embedded.
fn candidates_prompt(transcript: &str) -> String {
    format!(
        "You are a clinical pharmacology assistant. The following text is a \
speech-to-text transcript of a doctor's dictation and may contain transcription \
errors. List every drug or medicine name you can infer from it.\n\
Respond with ONLY a JSON array of drug name strings, for example \
[\"Metformin\", \"Atorvastatin\"]. If there are none, respond with [].\n\
\n\
Transcript:\n\
{transcript}\n"
    )
}

/// Strip a Markdown code fence (``` or ```json) wrapping, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") up to the first newline.
    let body = match without_open.find('\n') {
        Some(newline) => &without_open[newline + 1..],
        None => without_open,
    };

    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse the model's candidate answer as a list of strings.
///
/// Shape mismatches are not errors: a malformed answer means no candidates.
fn parse_candidates(text: &str) -> Vec<String> {
    let body = strip_code_fence(text);

    match serde_json::from_str::<Vec<String>>(body) {
        Ok(names) => names,
        Err(err) => {
            warn!("Candidate list did not parse as a string array: {}", err);
            Vec::new()
        }
    }
}

impl<G: TextGenerator, R: DrugLabelRegistry> ScreeningEngine<G, R> {
    pub fn new(generator: G, registry: R) -> Self {
        Self {
            generator,
            registry,
        }
    }

    /// Screen one transcript, returning alerts in order of first successful
    /// validation.
    pub async fn screen(&self, transcript: &str) -> Vec<AdrAlert> {
        if transcript.split_whitespace().count() < MIN_TRANSCRIPT_TOKENS {
            debug!("Transcript too short for screening, skipping backend calls");
            return Vec::new();
        }

        let candidates = self.extract_candidates(transcript).await;
        if candidates.is_empty() {
            return Vec::new();
        }
        info!("Validating {} drug name candidates", candidates.len());

        let mut seen: HashSet<String> = HashSet::new();
        let mut alerts = Vec::new();

        for candidate in candidates {
            let name = candidate.trim();
            if name.is_empty() {
                continue;
            }

            // Marked seen regardless of outcome so one name is queried at
            // most once per call.
            if !seen.insert(name.to_ascii_lowercase()) {
                continue;
            }

            match self.registry.find_label(name).await {
                Ok(Some(hit)) => {
                    debug!("Candidate '{}' matched {} label(s)", name, hit.matches);
                    alerts.push(AdrAlert {
                        drug: name.to_string(),
                        symptom: REGISTRY_MATCH_SYMPTOM.to_string(),
                    });
                }
                Ok(None) => {
                    // Expected for STT mishears and non-drug words.
                    debug!("Candidate '{}' not found in registry", name);
                }
                Err(err) => {
                    warn!("Registry lookup for '{}' failed: {:#}", name, err);
                }
            }
        }

        alerts
    }

    /// Step 1: candidate drug names from the generative model.
    async fn extract_candidates(&self, transcript: &str) -> Vec<String> {
        let prompt = candidates_prompt(transcript);

        match self.generator.generate(&prompt).await {
            Ok(Completion::Text(text)) => parse_candidates(&text),
            Ok(Completion::Blocked) => {
                warn!("Candidate extraction was blocked or empty");
                Vec::new()
            }
            Err(err) => {
                warn!("Candidate extraction call failed: {:#}", err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adr::registry::LabelHit;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const LONG_TRANSCRIPT: &str = "Patient reports nausea after starting Metformin \
last month and also takes metformin at night plus Brufen for knee pain";

    struct ScriptedGenerator {
        response: Result<Completion, String>,
        calls: Arc<AtomicUsize>,
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

    fn generator(response: Result<Completion, String>) -> (ScriptedGenerator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            ScriptedGenerator {
                response,
                calls: calls.clone(),
            },
            calls,
        )
    }

    /// Registry that records queried names and answers from a script.
    struct ScriptedRegistry {
        known: Vec<String>,
        failing: Vec<String>,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedRegistry {
        fn new(known: &[&str], failing: &[&str]) -> Self {
            Self {
                known: known.iter().map(|s| s.to_string()).collect(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                queries: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn queries(&self) -> Arc<Mutex<Vec<String>>> {
            self.queries.clone()
        }
    }

    #[async_trait]
    impl DrugLabelRegistry for ScriptedRegistry {
        async fn find_label(&self, name: &str) -> Result<Option<LabelHit>> {
            self.queries.lock().unwrap().push(name.to_string());
            if self.failing.iter().any(|f| f.eq_ignore_ascii_case(name)) {
                return Err(anyhow::anyhow!("registry unreachable"));
            }
            if self.known.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                return Ok(Some(LabelHit { matches: 1 }));
            }
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_short_transcript_makes_no_backend_calls() {
        let (generator, calls) = generator(Ok(Completion::Text("[\"Metformin\"]".into())));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let queries = registry.queries();
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen("fever and cough").await;

        assert!(alerts.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_case_differing_mentions_dedupe_to_one_alert() {
        let (generator, _) = generator(Ok(Completion::Text(
            "[\"Metformin\", \"metformin\", \"METFORMIN\"]".into(),
        )));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let queries = registry.queries();
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen(LONG_TRANSCRIPT).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].drug, "Metformin");
        assert_eq!(alerts[0].symptom, REGISTRY_MATCH_SYMPTOM);
        // Deduped before the registry, not after
        assert_eq!(queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_candidate_excluded_silently() {
        let (generator, _) = generator(Ok(Completion::Text(
            "[\"Metformin\", \"Flurbiprofezone\"]".into(),
        )));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen(LONG_TRANSCRIPT).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].drug, "Metformin");
    }

    #[tokio::test]
    async fn test_registry_fault_skips_only_that_candidate() {
        let (generator, _) = generator(Ok(Completion::Text(
            "[\"Brufen\", \"Metformin\"]".into(),
        )));
        let registry = ScriptedRegistry::new(&["Metformin"], &["Brufen"]);
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen(LONG_TRANSCRIPT).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].drug, "Metformin");
    }

    #[tokio::test]
    async fn test_malformed_candidate_list_is_empty_not_fatal() {
        let (generator, _) = generator(Ok(Completion::Text(
            "I found Metformin and Brufen in the transcript.".into(),
        )));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let queries = registry.queries();
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen(LONG_TRANSCRIPT).await;

        assert!(alerts.is_empty());
        assert!(queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_code_fenced_candidate_list_is_unwrapped() {
        let (generator, _) = generator(Ok(Completion::Text(
            "```json\n[\"Metformin\"]\n```".into(),
        )));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let engine = ScreeningEngine::new(generator, registry);

        let alerts = engine.screen(LONG_TRANSCRIPT).await;
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_generator_fault_yields_empty_alerts() {
        let (generator, _) = generator(Err("timeout".to_string()));
        let registry = ScriptedRegistry::new(&["Metformin"], &[]);
        let engine = ScreeningEngine::new(generator, registry);

        assert!(engine.screen(LONG_TRANSCRIPT).await.is_empty());
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("[\"A\"]"), "[\"A\"]");
        assert_eq!(strip_code_fence("```json\n[\"A\"]\n```"), "[\"A\"]");
        assert_eq!(strip_code_fence("```\n[\"A\"]\n```"), "[\"A\"]");
    }

    #[test]
    fn test_parse_candidates_rejects_non_string_arrays() {
        assert!(parse_candidates("[1, 2, 3]").is_empty());
        assert!(parse_candidates("{\"drugs\": [\"A\"]}").is_empty());
        assert_eq!(parse_candidates("[\"A\", \"B\"]"), vec!["A", "B"]);
    }
}
