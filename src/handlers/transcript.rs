//! # Transcript Processing Handler
//!
//! `POST /process_transcript_text` — run the narrative extraction engine
//! over the accumulated dictation transcript.
//!
//! ## Response Shape:
//! - Success: `{"ai_draft": {..structured draft..}, "original_gemini_text": "..."}`
//! - Failure: `{"ai_draft": "<marker string>", "original_gemini_text": "<marker string>"}`
//!
//! The failure case deliberately reuses the same keys with a string payload:
//! the consultation UI detects the string-vs-object shape and renders a
//! failure state instead of empty fields.

use crate::error::AppError;
use crate::llm::GeminiClient;
use crate::notes::{ExtractionEngine, ExtractionOutcome};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ProcessTranscriptRequest {
    pub transcript_text: String,
}

pub async fn process_transcript_text(
    state: web::Data<AppState>,
    body: web::Json<ProcessTranscriptRequest>,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    if !config.gemini_configured() {
        return Err(AppError::ServiceUnavailable(
            "Generative model backend is not configured".to_string(),
        ));
    }

    let transcript = body.into_inner().transcript_text;
    info!("Received transcript text for processing: {} chars", transcript.len());

    let generator = GeminiClient::from_config(
        &config.gemini,
        Duration::from_secs(config.performance.model_timeout_secs),
    )?;
    let engine = ExtractionEngine::new(generator);

    let response = match engine.extract(&transcript).await {
        ExtractionOutcome::Draft {
            draft,
            original_text,
        } => json!({
            "ai_draft": draft,
            "original_gemini_text": original_text,
        }),
        ExtractionOutcome::Failed { marker } => json!({
            "ai_draft": marker,
            "original_gemini_text": marker,
        }),
    };

    Ok(HttpResponse::Ok().json(response))
}
