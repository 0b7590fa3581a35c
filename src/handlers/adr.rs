//! # ADR Screening Handler
//!
//! `POST /adr_screening` — extract candidate drug names from the transcript
//! and validate them against the label registry.
//!
//! The registry-configured check runs before any pipeline work; an
//! unconfigured registry is a 503, not an empty result.

use crate::adr::{OpenFdaClient, ScreeningEngine};
use crate::error::AppError;
use crate::llm::GeminiClient;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AdrScreeningRequest {
    pub transcript: String,
}

pub async fn adr_screening(
    state: web::Data<AppState>,
    body: web::Json<AdrScreeningRequest>,
) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    if !config.registry_configured() {
        return Err(AppError::ServiceUnavailable(
            "Drug label registry is not configured".to_string(),
        ));
    }

    if !config.gemini_configured() {
        return Err(AppError::ServiceUnavailable(
            "Generative model backend is not configured".to_string(),
        ));
    }

    let transcript = body.into_inner().transcript;

    let generator = GeminiClient::from_config(
        &config.gemini,
        Duration::from_secs(config.performance.model_timeout_secs),
    )?;
    let registry = OpenFdaClient::from_config(&config.registry)?;
    let engine = ScreeningEngine::new(generator, registry);

    let alerts = engine.screen(&transcript).await;
    info!("ADR screening produced {} alert(s)", alerts.len());

    Ok(HttpResponse::Ok().json(json!({
        "validated_adrs": alerts,
    })))
}
