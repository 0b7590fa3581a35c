//! # Drug Label Registry
//!
//! Lookup of candidate drug names against a public label registry. The seam
//! distinguishes three outcomes the screening engine treats differently:
//! `Ok(Some(..))` — the name matched at least one label; `Ok(None)` — the
//! registry answered and knows no such drug (expected, silent); `Err(..)` —
//! the lookup itself failed (logged, candidate skipped).

use crate::config::RegistryConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Evidence that a candidate name exists in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelHit {
    /// Number of label records matching the query
    pub matches: u64,
}

/// Name-in, match-out label lookup.
#[async_trait]
pub trait DrugLabelRegistry: Send + Sync {
    /// Exact-ish match on brand or generic name. `Ok(None)` means the
    /// registry positively knows no such drug.
    async fn find_label(&self, name: &str) -> Result<Option<LabelHit>>;
}

/// Client for the openFDA drug label endpoint.
pub struct OpenFdaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    results: MetaResults,
}

#[derive(Debug, Deserialize)]
struct MetaResults {
    total: u64,
}

impl OpenFdaClient {
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build the registry HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Search expression matching the name against brand or generic label
    /// fields. Embedded quotes are stripped; they would break the query
    /// syntax and no real drug name carries them.
    fn search_expression(name: &str) -> String {
        let sanitized = name.replace('"', "");
        format!(
            "openfda.brand_name:\"{0}\"+openfda.generic_name:\"{0}\"",
            sanitized
        )
    }
}

#[async_trait]
impl DrugLabelRegistry for OpenFdaClient {
    async fn find_label(&self, name: &str) -> Result<Option<LabelHit>> {
        let url = format!("{}/drug/label.json", self.base_url);

        let mut query: Vec<(&str, String)> = vec![
            ("search", Self::search_expression(name)),
            ("limit", "1".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("api_key", key.clone()));
        }

        debug!("Registry lookup for candidate '{}'", name);
        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("Registry request failed")?;

        // openFDA answers 404 for a query with no matching records; that is
        // the expected not-found signal, not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Registry returned {}", status));
        }

        let parsed: LabelResponse = response
            .json()
            .await
            .context("Registry response was not valid JSON")?;

        if parsed.meta.results.total == 0 {
            return Ok(None);
        }

        Ok(Some(LabelHit {
            matches: parsed.meta.results.total,
        }))
    }
}
