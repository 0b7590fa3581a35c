//! Recognition event and session configuration types.

use crate::config::{AudioConfig, SpeechConfig};
use serde::{Deserialize, Serialize};

/// One hypothesis from the streaming recognizer.
///
/// Events arrive in the order audio was submitted; the recognizer guarantees
/// monotonic, same-order emission within a session. Interim hypotheses may be
/// revised by later events, finals are stable. Neither is persisted here; the
/// client accumulates whatever it wants to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Partial hypothesis, subject to revision
    Interim(String),

    /// Completed hypothesis for a stretch of audio
    Final(String),
}

impl RecognitionEvent {
    pub fn text(&self) -> &str {
        match self {
            RecognitionEvent::Interim(text) | RecognitionEvent::Final(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, RecognitionEvent::Final(_))
    }
}

/// Per-session recognizer configuration.
///
/// Serialized into the query string of the streaming connect URL, so field
/// names follow the recognizer's parameter names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Wire encoding of the audio frames ("linear16")
    pub encoding: String,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u8,

    /// BCP-47 language code
    pub language: String,

    /// Request automatic punctuation
    pub punctuate: bool,

    /// Request interim (partial) hypotheses
    pub interim_results: bool,
}

impl RecognitionConfig {
    /// Build the fixed dictation-session configuration from app config.
    pub fn from_config(audio: &AudioConfig, speech: &SpeechConfig) -> Self {
        Self {
            encoding: "linear16".to_string(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            language: speech.language.clone(),
            punctuate: speech.punctuation,
            interim_results: speech.interim_results,
        }
    }

    /// Render the configuration as connect-URL query parameters.
    pub fn to_query_string(&self) -> String {
        format!(
            "encoding={}&sample_rate={}&channels={}&language={}&punctuate={}&interim_results={}",
            self.encoding,
            self.sample_rate,
            self.channels,
            self.language,
            self.punctuate,
            self.interim_results
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_event_accessors() {
        let interim = RecognitionEvent::Interim("patient has".to_string());
        let fin = RecognitionEvent::Final("patient has fever".to_string());

        assert_eq!(interim.text(), "patient has");
        assert!(!interim.is_final());
        assert!(fin.is_final());
    }

    #[test]
    fn test_session_config_from_app_config() {
        let config = AppConfig::default();
        let rc = RecognitionConfig::from_config(&config.audio, &config.speech);

        assert_eq!(rc.encoding, "linear16");
        assert_eq!(rc.sample_rate, 48_000);
        assert_eq!(rc.language, "en-US");
        assert!(rc.punctuate);
        assert!(rc.interim_results);
    }

    #[test]
    fn test_query_string_rendering() {
        let config = AppConfig::default();
        let rc = RecognitionConfig::from_config(&config.audio, &config.speech);
        let qs = rc.to_query_string();

        assert!(qs.contains("encoding=linear16"));
        assert!(qs.contains("sample_rate=48000"));
        assert!(qs.contains("language=en-US"));
        assert!(qs.contains("interim_results=true"));
    }
}
