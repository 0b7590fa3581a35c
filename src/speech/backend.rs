//! # Streaming Recognition Backend
//!
//! The `SpeechBackend` trait is the seam between the dictation relay and
//! whatever speech-recognition service is deployed. One stream is opened per
//! dictation and never shared across connections.
//!
//! `StreamingSttClient` is the production implementation: a WebSocket client
//! speaking the streaming STT wire protocol (binary PCM frames up, JSON
//! result events down). The session configuration travels in the connect
//! URL's query string; a `CloseStream` text frame tells the service the
//! input side is done while leaving buffered results to drain.

use crate::speech::types::{RecognitionConfig, RecognitionEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Seam between the relay and the recognition service.
///
/// ## Contract:
/// - Frames read from `audio` are submitted in order, unbuffered.
/// - Dropping the `audio` sender closes the input side only; events already
///   produced by the service keep arriving on the returned receiver.
/// - The returned receiver closes when the service has flushed its last
///   result (or the transport fails).
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn open_stream(
        &self,
        config: &RecognitionConfig,
        audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<mpsc::Receiver<RecognitionEvent>>;
}

/// WebSocket client for a streaming speech-recognition service.
pub struct StreamingSttClient {
    endpoint_url: String,
    api_key: Option<String>,
}

impl StreamingSttClient {
    pub fn new(endpoint_url: String, api_key: Option<String>) -> Self {
        Self {
            endpoint_url,
            api_key,
        }
    }

    /// Connect URL for one session: endpoint plus recognizer parameters.
    fn session_url(&self, config: &RecognitionConfig) -> String {
        let separator = if self.endpoint_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.endpoint_url, separator, config.to_query_string())
    }
}

/// One result message from the recognition service.
///
/// Non-result messages (metadata, keepalives) don't carry a `channel` and
/// are skipped at parse time.
#[derive(Debug, Deserialize)]
struct StreamingResponse {
    #[serde(default)]
    is_final: bool,
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

impl StreamingResponse {
    /// Top hypothesis as a recognition event, if the message carries one.
    fn into_event(mut self) -> Option<RecognitionEvent> {
        if self.channel.alternatives.is_empty() {
            return None;
        }
        let transcript = self.channel.alternatives.remove(0).transcript;
        Some(if self.is_final {
            RecognitionEvent::Final(transcript)
        } else {
            RecognitionEvent::Interim(transcript)
        })
    }
}

#[async_trait]
impl SpeechBackend for StreamingSttClient {
    async fn open_stream(
        &self,
        config: &RecognitionConfig,
        mut audio: mpsc::Receiver<Vec<u8>>,
    ) -> Result<mpsc::Receiver<RecognitionEvent>> {
        let url = self.session_url(config);

        let mut request = url
            .clone()
            .into_client_request()
            .context("Invalid recognizer endpoint URL")?;

        if let Some(key) = &self.api_key {
            request.headers_mut().insert(
                AUTHORIZATION,
                format!("Token {}", key)
                    .parse()
                    .context("Recognizer API key is not a valid header value")?,
            );
        }

        let (ws, _) = connect_async(request)
            .await
            .context("Failed to connect to the streaming recognizer")?;
        debug!("Recognition stream opened: {}", url);

        let (mut sink, mut stream) = ws.split();
        let (event_tx, event_rx) = mpsc::channel::<RecognitionEvent>(64);

        // Write pump: client audio frames → recognizer, in arrival order.
        // When the audio sender is dropped the input side is closed with a
        // CloseStream frame; the read pump keeps draining afterwards.
        tokio::spawn(async move {
            while let Some(frame) = audio.recv().await {
                if let Err(err) = sink.send(Message::Binary(frame)).await {
                    warn!("Recognition stream send failed: {}", err);
                    return;
                }
            }

            let close = Message::Text(r#"{"type":"CloseStream"}"#.to_string());
            if let Err(err) = sink.send(close).await {
                debug!("Recognition stream already closed on input end: {}", err);
            }
        });

        // Read pump: recognizer messages → recognition events, same order.
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let response: StreamingResponse = match serde_json::from_str(&text) {
                            Ok(response) => response,
                            Err(_) => {
                                debug!("Skipping non-result recognizer message");
                                continue;
                            }
                        };

                        if let Some(event) = response.into_event() {
                            if event_tx.send(event).await.is_err() {
                                // Relay side is gone; stop draining.
                                return;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Recognition stream receive failed: {}", err);
                        break;
                    }
                }
            }
            // event_tx drops here, closing the event receiver.
        });

        Ok(event_rx)
    }
}
