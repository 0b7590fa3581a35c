//! # Runtime Configuration Handlers
//!
//! GET returns the current configuration with secrets redacted; PUT applies
//! a partial update (validated before it takes effect).

use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn redacted_config_json(config: &crate::config::AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "audio": {
            "sample_rate": config.audio.sample_rate,
            "channels": config.audio.channels,
            "bit_depth": config.audio.bit_depth,
            "max_frame_bytes": config.audio.max_frame_bytes
        },
        "speech": {
            "endpoint_url": config.speech.endpoint_url,
            "language": config.speech.language,
            "punctuation": config.speech.punctuation,
            "interim_results": config.speech.interim_results,
            "receive_timeout_secs": config.speech.receive_timeout_secs,
            "first_result_warn_secs": config.speech.first_result_warn_secs,
            "api_key_set": config.speech.api_key.is_some()
        },
        "gemini": {
            "model_id": config.gemini.model_id,
            "endpoint": config.gemini.endpoint,
            "api_key_set": config.gemini_configured()
        },
        "registry": {
            "base_url": config.registry.base_url,
            "request_timeout_secs": config.registry.request_timeout_secs,
            "api_key_set": config.registry.api_key.is_some()
        },
        "performance": {
            "max_concurrent_dictations": config.performance.max_concurrent_dictations,
            "model_timeout_secs": config.performance.model_timeout_secs
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": redacted_config_json(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config.update_from_json(&json_str)?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": redacted_config_json(&current_config)
    })))
}
