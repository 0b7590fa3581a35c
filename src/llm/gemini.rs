//! # Gemini Client
//!
//! HTTP client for the Gemini `generateContent` API. One request per
//! generation call; no shared mutable state, so concurrent extractions and
//! screenings never interfere.

use crate::config::GeminiConfig;
use crate::llm::{Completion, TextGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the Gemini generateContent endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn from_config(config: &GeminiConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build the Gemini HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.endpoint, self.model_id, self.api_key
        )
    }

    /// Pull the first candidate's concatenated text out of a response.
    ///
    /// An explicit block reason, no candidates, or candidates without text
    /// all collapse to `Blocked`; callers don't care which flavor of
    /// nothing the model produced.
    fn completion_from_response(response: GenerateResponse) -> Completion {
        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                warn!("Gemini blocked the prompt: {}", reason);
                return Completion::Blocked;
            }
        }

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Completion::Blocked
        } else {
            Completion::Text(text)
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Completion> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!("Calling Gemini model {}", self.model_id);
        let response = self
            .client
            .post(self.request_url())
            .json(&request)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Gemini response was not valid JSON")?;

        Ok(Self::completion_from_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        let config = GeminiConfig {
            api_key: "test-key".to_string(),
            model_id: "gemini-1.5-flash-latest".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/".to_string(),
        };
        GeminiClient::from_config(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_request_url_shape() {
        let url = client().request_url();
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent?key=test-key"
        );
    }

    #[test]
    fn test_text_response_yields_completion() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "Chief Complaints:"}, {"text": " fever"}]}}
            ]
        }"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            GeminiClient::completion_from_response(response),
            Completion::Text("Chief Complaints: fever".to_string())
        );
    }

    #[test]
    fn test_block_reason_yields_blocked() {
        let raw = r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            GeminiClient::completion_from_response(response),
            Completion::Blocked
        );
    }

    #[test]
    fn test_empty_candidates_yield_blocked() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(
            GeminiClient::completion_from_response(response),
            Completion::Blocked
        );
    }

    #[test]
    fn test_whitespace_only_text_yields_blocked() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "  \n"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            GeminiClient::completion_from_response(response),
            Completion::Blocked
        );
    }
}
