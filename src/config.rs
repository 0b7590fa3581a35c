//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, GEMINI_API_KEY, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)
//!
//! ## Sections:
//! - **server**: bind address for the HTTP/WebSocket server
//! - **audio**: PCM format the dictation clients are expected to send
//! - **speech**: streaming speech-recognition backend and relay timeouts
//! - **gemini**: generative text backend used for note structuring and ADR screening
//! - **registry**: public drug-label registry used for ADR validation
//! - **performance**: concurrency limits and upstream request timeouts

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// Broken into logical groups so each subsystem only has to carry the part
/// it actually reads (the relay takes `audio` + `speech`, the extraction
/// handler takes `gemini`, the ADR handler takes `gemini` + `registry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub speech: SpeechConfig,
    pub gemini: GeminiConfig,
    pub registry: RegistryConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// - `host = "127.0.0.1"`: only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// PCM format dictation clients must send over `/live_transcript`.
///
/// The browser capture path delivers 48 kHz mono linear PCM, so that is the
/// fixed session format; frames that do not fit it are rejected at the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (48000 for browser capture)
    pub sample_rate: u32,

    /// Number of audio channels (mono dictation)
    pub channels: u8,

    /// Bit depth (16-bit signed little-endian PCM)
    pub bit_depth: u8,

    /// Upper bound on a single WebSocket audio frame, in bytes
    pub max_frame_bytes: usize,
}

/// Streaming speech-recognition backend settings and relay timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// WebSocket URL of the streaming recognizer (empty = not configured)
    pub endpoint_url: String,

    /// Optional API key sent as an Authorization header on connect
    pub api_key: Option<String>,

    /// BCP-47 language code for recognition
    pub language: String,

    /// Ask the recognizer for automatic punctuation
    pub punctuation: bool,

    /// Ask the recognizer for interim (partial) hypotheses
    pub interim_results: bool,

    /// Hard bound: seconds the relay waits for the next client frame before
    /// ending the session
    pub receive_timeout_secs: u64,

    /// Advisory: seconds after the first audio frame without any recognition
    /// event before a warning is logged (the session keeps running)
    pub first_result_warn_secs: u64,
}

/// Generative text backend (Gemini) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (empty = backend not configured; extraction answers 503)
    pub api_key: String,

    /// Model identifier, e.g. "gemini-1.5-flash-latest"
    pub model_id: String,

    /// API base URL, overridable for testing against a stub
    pub endpoint: String,
}

/// Drug-label registry (openFDA) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL (empty = not configured; ADR screening answers 503)
    pub base_url: String,

    /// Optional API key appended to label queries
    pub api_key: Option<String>,

    /// Per-request timeout for label lookups, in seconds
    pub request_timeout_secs: u64,
}

/// Performance tuning configuration.
///
/// - Higher concurrent dictations: more simultaneous doctors, more upstream
///   recognizer streams held open
/// - Longer model timeout: tolerates slow generations at the cost of held
///   request handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_dictations: usize,
    pub model_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            audio: AudioConfig {
                sample_rate: 48_000, // what the browser capture path actually produces
                channels: 1,
                bit_depth: 16,
                max_frame_bytes: 64 * 1024,
            },
            speech: SpeechConfig {
                endpoint_url: String::new(),
                api_key: None,
                language: "en-US".to_string(),
                punctuation: true,
                interim_results: true,
                receive_timeout_secs: 10,
                first_result_warn_secs: 7,
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                model_id: "gemini-1.5-flash-latest".to_string(),
                endpoint: "https://generativelanguage.googleapis.com".to_string(),
            },
            registry: RegistryConfig {
                base_url: "https://api.fda.gov".to_string(),
                api_key: None,
                request_timeout_secs: 10,
            },
            performance: PerformanceConfig {
                max_concurrent_dictations: 10,
                model_timeout_secs: 60,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for bare HOST, PORT, GEMINI_API_KEY,
    ///    GEMINI_MODEL_ID and OPENFDA_API_KEY variables used by deployment
    ///    platforms and .env files
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Special environment variables that don't follow the APP_ prefix
        // convention but are commonly present in deployments and .env files.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("GEMINI_API_KEY") {
            settings = settings.set_override("gemini.api_key", key)?;
        }

        if let Ok(model) = env::var("GEMINI_MODEL_ID") {
            settings = settings.set_override("gemini.model_id", model)?;
        }

        if let Ok(key) = env::var("OPENFDA_API_KEY") {
            settings = settings.set_override("registry.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching configuration errors at startup prevents runtime failures
    /// mid-dictation and gives a clear message about what is wrong.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if !(8_000..=48_000).contains(&self.audio.sample_rate) {
            return Err(anyhow::anyhow!(
                "Audio sample rate must be between 8000 and 48000 Hz"
            ));
        }

        if self.audio.channels != 1 {
            return Err(anyhow::anyhow!("Dictation audio must be mono"));
        }

        if self.audio.bit_depth != 16 {
            return Err(anyhow::anyhow!("Dictation audio must be 16-bit PCM"));
        }

        if self.audio.max_frame_bytes == 0 {
            return Err(anyhow::anyhow!("Max audio frame size must be greater than 0"));
        }

        if self.speech.receive_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Receive timeout must be greater than 0"));
        }

        if self.performance.max_concurrent_dictations == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent dictations must be greater than 0"
            ));
        }

        if self.performance.model_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Model timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// Allows partial updates: sending just `{"server": {"port": 9000}}`
    /// changes only the port. Secrets (API keys) are deliberately not
    /// updatable at runtime; they come from the environment.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(speech) = partial_config.get("speech") {
            if let Some(url) = speech.get("endpoint_url").and_then(|v| v.as_str()) {
                self.speech.endpoint_url = url.to_string();
            }
            if let Some(language) = speech.get("language").and_then(|v| v.as_str()) {
                self.speech.language = language.to_string();
            }
            if let Some(timeout) = speech.get("receive_timeout_secs").and_then(|v| v.as_u64()) {
                self.speech.receive_timeout_secs = timeout;
            }
            if let Some(warn) = speech.get("first_result_warn_secs").and_then(|v| v.as_u64()) {
                self.speech.first_result_warn_secs = warn;
            }
        }

        if let Some(gemini) = partial_config.get("gemini") {
            if let Some(model) = gemini.get("model_id").and_then(|v| v.as_str()) {
                self.gemini.model_id = model.to_string();
            }
        }

        if let Some(registry) = partial_config.get("registry") {
            if let Some(url) = registry.get("base_url").and_then(|v| v.as_str()) {
                self.registry.base_url = url.to_string();
            }
            if let Some(timeout) = registry
                .get("request_timeout_secs")
                .and_then(|v| v.as_u64())
            {
                self.registry.request_timeout_secs = timeout;
            }
        }

        if let Some(performance) = partial_config.get("performance") {
            if let Some(dictations) = performance
                .get("max_concurrent_dictations")
                .and_then(|v| v.as_u64())
            {
                self.performance.max_concurrent_dictations = dictations as usize;
            }
            if let Some(timeout) = performance
                .get("model_timeout_secs")
                .and_then(|v| v.as_u64())
            {
                self.performance.model_timeout_secs = timeout;
            }
        }

        self.validate()?;
        Ok(())
    }

    /// Whether the generative text backend has credentials.
    pub fn gemini_configured(&self) -> bool {
        !self.gemini.api_key.trim().is_empty()
    }

    /// Whether the drug-label registry is reachable by configuration.
    pub fn registry_configured(&self) -> bool {
        !self.registry.base_url.trim().is_empty()
    }
}
