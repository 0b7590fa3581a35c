//! # Client Line Protocol
//!
//! The relay speaks a deliberately simple text protocol back to the browser:
//! one UTF-8 line per message, prefixed with its kind.
//!
//! ## Message Format:
//! - **Server → Client**: `FINAL: <text>`, `INTERIM: <text>`,
//!   `STATUS: <message>`, `ERROR: <message>`
//! - **Client → Server**: binary PCM frames; an empty binary frame signals
//!   end-of-input
//!
//! `EventRelay` maps recognition events onto lines and tracks whether the
//! session produced any transcript at all, so the relay can send exactly one
//! `STATUS:` line when a whole dictation came and went without a usable
//! hypothesis.

use crate::speech::types::RecognitionEvent;
use std::fmt;

/// Status line sent when a recognition stream ends without a single
/// transcript line.
pub const NO_TRANSCRIPT_STATUS: &str = "No transcript generated. Check mic or audio format.";

/// One line of the relay's outbound protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine {
    /// Completed hypothesis
    Final(String),

    /// Partial hypothesis (never sent with empty text)
    Interim(String),

    /// Terminal session status
    Status(String),

    /// Best-effort failure report
    Error(String),
}

impl fmt::Display for ClientLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientLine::Final(text) => write!(f, "FINAL: {}", text),
            ClientLine::Interim(text) => write!(f, "INTERIM: {}", text),
            ClientLine::Status(message) => write!(f, "STATUS: {}", message),
            ClientLine::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

/// Maps the recognizer's event stream onto the outbound line protocol.
///
/// One instance per dictation session. Not shared across sessions; the only
/// state is whether any line has been produced yet.
#[derive(Debug, Default)]
pub struct EventRelay {
    transcript_sent: bool,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one recognition event into at most one outbound line.
    ///
    /// Finals always produce a line, even when empty (an empty final is the
    /// recognizer's way of closing out a stretch of audio it could not
    /// decode, and the original wire contract forwards it). Interims with
    /// empty text carry no information and are suppressed.
    pub fn on_event(&mut self, event: RecognitionEvent) -> Option<ClientLine> {
        let line = match event {
            RecognitionEvent::Final(text) => ClientLine::Final(text),
            RecognitionEvent::Interim(text) => {
                if text.is_empty() {
                    return None;
                }
                ClientLine::Interim(text)
            }
        };

        self.transcript_sent = true;
        Some(line)
    }

    /// Whether any transcript line has been produced so far.
    pub fn transcript_sent(&self) -> bool {
        self.transcript_sent
    }

    /// Close out the session once the event stream is exhausted.
    ///
    /// Yields the one `STATUS:` line owed to a session that never produced a
    /// transcript; yields nothing otherwise.
    pub fn finish(self) -> Option<ClientLine> {
        if self.transcript_sent {
            None
        } else {
            Some(ClientLine::Status(NO_TRANSCRIPT_STATUS.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_rendering() {
        assert_eq!(
            ClientLine::Final("patient has fever".into()).to_string(),
            "FINAL: patient has fever"
        );
        assert_eq!(
            ClientLine::Interim("patient".into()).to_string(),
            "INTERIM: patient"
        );
        assert_eq!(
            ClientLine::Status("done".into()).to_string(),
            "STATUS: done"
        );
        assert_eq!(
            ClientLine::Error("recognizer unreachable".into()).to_string(),
            "ERROR: recognizer unreachable"
        );
    }

    #[test]
    fn test_final_produces_line() {
        let mut relay = EventRelay::new();
        let line = relay.on_event(RecognitionEvent::Final("hello".into()));
        assert_eq!(line, Some(ClientLine::Final("hello".into())));
        assert!(relay.transcript_sent());
    }

    #[test]
    fn test_empty_interim_suppressed() {
        let mut relay = EventRelay::new();
        assert_eq!(relay.on_event(RecognitionEvent::Interim(String::new())), None);
        assert!(!relay.transcript_sent());
    }

    #[test]
    fn test_silent_session_gets_exactly_one_status_line() {
        let relay = EventRelay::new();
        let line = relay.finish();
        assert_eq!(
            line,
            Some(ClientLine::Status(NO_TRANSCRIPT_STATUS.to_string()))
        );
    }

    #[test]
    fn test_no_status_after_transcript() {
        let mut relay = EventRelay::new();
        relay.on_event(RecognitionEvent::Interim("partial".into()));
        assert_eq!(relay.finish(), None);
    }

    #[test]
    fn test_event_order_is_preserved() {
        let mut relay = EventRelay::new();
        let events = vec![
            RecognitionEvent::Interim("patient".into()),
            RecognitionEvent::Interim("patient has".into()),
            RecognitionEvent::Final("patient has fever".into()),
        ];

        let lines: Vec<ClientLine> = events
            .into_iter()
            .filter_map(|e| relay.on_event(e))
            .collect();

        assert_eq!(
            lines,
            vec![
                ClientLine::Interim("patient".into()),
                ClientLine::Interim("patient has".into()),
                ClientLine::Final("patient has fever".into()),
            ]
        );
    }
}
