//! # Dictation Relay
//!
//! Bridges one clinician's WebSocket audio connection to one streaming
//! recognition session for the lifetime of a dictation. Clients connect to
//! `/live_transcript` and send binary PCM frames; the relay answers with the
//! text line protocol from [`crate::speech::protocol`].
//!
//! ## Session Protocol:
//! 1. **Connection**: client connects; a recognition stream is opened
//! 2. **Streaming**: each binary frame is validated and forwarded
//!    immediately — no buffering or batching
//! 3. **End of input**: an empty binary frame (or going silent past the
//!    receive timeout) closes the input side; buffered recognition results
//!    keep draining to the client
//! 4. **Close**: once the event stream is exhausted the connection is closed
//!    exactly once; a silent session gets a single `STATUS:` line first
//!
//! ## Concurrency Model:
//! One actor per connection. Frame handling runs on the actor; a spawned
//! drain task pulls recognition events and posts them back as actor
//! messages, so inbound frames never block outbound results. The drain task
//! is aborted when the actor stops — a recognition stream never outlives its
//! client connection.
//!
//! ## Timeouts:
//! - receive timeout (hard, default 10s): no client frame for this long
//!   while streaming → input side is closed and the session winds down
//! - first-result clock (advisory, default 7s): no recognition event this
//!   long after the first audio frame → one warning log, nothing else

use crate::audio::frame::{peak_amplitude, FrameSpec};
use crate::speech::backend::SpeechBackend;
use crate::speech::protocol::{ClientLine, EventRelay};
use crate::speech::types::RecognitionConfig;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How often the watchdog checks the session clocks.
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the frame channel into the recognition stream. Backpressure
/// past this point means the recognizer stalled; frames are dropped with a
/// warning rather than queued without bound.
const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Where the session is in its lifecycle. No re-entry: once draining or
/// closed, a session never streams again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayPhase {
    /// Pulling client frames and forwarding them
    Streaming,
    /// Input side closed; recognition results still draining
    Draining,
    /// Connection closed
    Closed,
}

/// WebSocket actor for one dictation session.
pub struct DictationSocket {
    /// Identifier for log correlation across the actor and drain task
    dictation_id: String,

    /// Shared application state (dictation slot accounting)
    state: web::Data<AppState>,

    /// Recognition backend; one stream is opened per session
    backend: Arc<dyn SpeechBackend>,

    /// Session recognizer configuration
    recognition_config: RecognitionConfig,

    /// Expected PCM frame format
    frame_spec: FrameSpec,

    /// Hard bound on client silence while streaming
    receive_timeout: Duration,

    /// Advisory bound on time-to-first-result
    first_result_warn: Duration,

    /// Input half of the recognition stream; `None` once draining
    audio_tx: Option<mpsc::Sender<Vec<u8>>>,

    /// Drain task handle, aborted on stop
    drain_handle: Option<tokio::task::JoinHandle<()>>,

    /// Lifecycle phase
    phase: RelayPhase,

    /// Last client activity (frame, ping or pong)
    last_client_activity: Instant,

    /// Set at the first audio frame; cleared when the first recognition
    /// event arrives or after the warning fires
    first_result_deadline: Option<Instant>,

    /// Whether any audio frame has been accepted yet
    first_frame_seen: bool,
}

impl DictationSocket {
    pub fn new(
        state: web::Data<AppState>,
        backend: Arc<dyn SpeechBackend>,
        recognition_config: RecognitionConfig,
        frame_spec: FrameSpec,
        receive_timeout: Duration,
        first_result_warn: Duration,
    ) -> Self {
        Self {
            dictation_id: Uuid::new_v4().to_string(),
            state,
            backend,
            recognition_config,
            frame_spec,
            receive_timeout,
            first_result_warn,
            audio_tx: None,
            drain_handle: None,
            phase: RelayPhase::Streaming,
            last_client_activity: Instant::now(),
            first_result_deadline: None,
            first_frame_seen: false,
        }
    }

    /// Handle one binary audio frame from the client.
    fn handle_frame(&mut self, data: &[u8]) {
        self.last_client_activity = Instant::now();

        if self.phase != RelayPhase::Streaming {
            debug!(dictation = %self.dictation_id, "Frame after input close, ignoring");
            return;
        }

        // Empty frame is the client's end-of-stream sentinel.
        if data.is_empty() {
            info!(dictation = %self.dictation_id, "End-of-stream frame received");
            self.close_input();
            return;
        }

        if let Err(reason) = self.frame_spec.validate_frame(data) {
            warn!(dictation = %self.dictation_id, "Rejected audio frame: {}", reason);
            return;
        }

        if !self.first_frame_seen {
            // The first audio frame starts the advisory result clock.
            self.first_frame_seen = true;
            self.first_result_deadline = Some(Instant::now() + self.first_result_warn);
        }

        debug!(
            dictation = %self.dictation_id,
            bytes = data.len(),
            duration_ms = self.frame_spec.frame_duration_ms(data),
            peak = peak_amplitude(data),
            "Forwarding audio frame"
        );

        if let Some(tx) = &self.audio_tx {
            match tx.try_send(data.to_vec()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        dictation = %self.dictation_id,
                        "Recognition stream is not keeping up, dropping frame"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(dictation = %self.dictation_id, "Recognition stream input already closed");
                    self.close_input();
                }
            }
        }
    }

    /// Close the input side of the recognition stream. Results already
    /// produced keep draining; Streaming → Draining.
    fn close_input(&mut self) {
        if self.phase == RelayPhase::Streaming {
            self.phase = RelayPhase::Draining;
        }
        self.audio_tx = None;
    }

    /// Watchdog tick: enforce the receive timeout, log the advisory
    /// first-result warning.
    fn on_watchdog(&mut self, _ctx: &mut ws::WebsocketContext<Self>) {
        if self.phase == RelayPhase::Streaming
            && self.last_client_activity.elapsed() > self.receive_timeout
        {
            info!(
                dictation = %self.dictation_id,
                "No client frame for {:?}, closing input side",
                self.receive_timeout
            );
            self.close_input();
        }

        if let Some(deadline) = self.first_result_deadline {
            if Instant::now() > deadline {
                // Advisory only: the receive timeout above is the enforced
                // bound, this is a breadcrumb for operators.
                warn!(
                    dictation = %self.dictation_id,
                    "No recognition results within {:?} of first audio frame",
                    self.first_result_warn
                );
                self.first_result_deadline = None;
            }
        }
    }
}

/// A recognition event arrived (possibly without a client line attached).
#[derive(Message)]
#[rtype(result = "()")]
struct ResultArrived;

/// One outbound protocol line for the client.
#[derive(Message)]
#[rtype(result = "()")]
struct ForwardLine(ClientLine);

/// The recognition event stream is exhausted; the session is over.
#[derive(Message)]
#[rtype(result = "()")]
struct StreamEnded;

/// The recognition stream failed; carries a short failure kind for the
/// best-effort ERROR line.
#[derive(Message)]
#[rtype(result = "()")]
struct StreamFailed {
    kind: String,
}

impl Actor for DictationSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(dictation = %self.dictation_id, "Dictation session started");

        let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(FRAME_CHANNEL_CAPACITY);
        self.audio_tx = Some(audio_tx);

        let addr = ctx.address();
        let backend = self.backend.clone();
        let config = self.recognition_config.clone();
        let dictation_id = self.dictation_id.clone();

        // Drain task: recognition events → actor messages. Coupled to the
        // actor only through its address, so inbound frame handling and
        // outbound result delivery never block each other.
        let handle = tokio::spawn(async move {
            let mut events = match backend.open_stream(&config, audio_rx).await {
                Ok(events) => events,
                Err(err) => {
                    error!(dictation = %dictation_id, "Failed to open recognition stream: {:#}", err);
                    addr.do_send(StreamFailed {
                        kind: "recognition stream unavailable".to_string(),
                    });
                    return;
                }
            };

            let mut relay = EventRelay::new();
            while let Some(event) = events.recv().await {
                addr.do_send(ResultArrived);
                if let Some(line) = relay.on_event(event) {
                    addr.do_send(ForwardLine(line));
                }
            }

            if let Some(status) = relay.finish() {
                addr.do_send(ForwardLine(status));
            }
            addr.do_send(StreamEnded);
        });
        self.drain_handle = Some(handle);

        ctx.run_interval(WATCHDOG_INTERVAL, |act, ctx| act.on_watchdog(ctx));
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.phase = RelayPhase::Closed;
        self.audio_tx = None;

        // The recognition stream must not outlive the connection.
        if let Some(handle) = self.drain_handle.take() {
            handle.abort();
        }

        self.state.end_dictation();
        info!(dictation = %self.dictation_id, "Dictation session closed");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for DictationSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.handle_frame(&data);
            }
            Ok(ws::Message::Text(_)) => {
                // The dictation protocol is binary-up, text-down.
                warn!(dictation = %self.dictation_id, "Unexpected text frame from client");
                self.last_client_activity = Instant::now();
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.last_client_activity = Instant::now();
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_client_activity = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(dictation = %self.dictation_id, "Client closed connection: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(dictation = %self.dictation_id, "Unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                // Transport faults are expected; terminate cleanly.
                info!(dictation = %self.dictation_id, "WebSocket protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<ResultArrived> for DictationSocket {
    type Result = ();

    fn handle(&mut self, _msg: ResultArrived, _ctx: &mut Self::Context) {
        // Any recognition activity satisfies the advisory clock.
        self.first_result_deadline = None;
    }
}

impl Handler<ForwardLine> for DictationSocket {
    type Result = ();

    fn handle(&mut self, msg: ForwardLine, ctx: &mut Self::Context) {
        ctx.text(msg.0.to_string());
    }
}

impl Handler<StreamEnded> for DictationSocket {
    type Result = ();

    fn handle(&mut self, _msg: StreamEnded, ctx: &mut Self::Context) {
        info!(dictation = %self.dictation_id, "Recognition stream drained");
        ctx.close(Some(ws::CloseCode::Normal.into()));
        ctx.stop();
    }
}

impl Handler<StreamFailed> for DictationSocket {
    type Result = ();

    fn handle(&mut self, msg: StreamFailed, ctx: &mut Self::Context) {
        // Best effort: the connection may already be gone, in which case the
        // line is silently lost.
        ctx.text(ClientLine::Error(msg.kind).to_string());
        ctx.close(Some(ws::CloseCode::Error.into()));
        ctx.stop();
    }
}

/// WebSocket endpoint handler for `/live_transcript`.
///
/// Refuses the upgrade outright when the recognizer is not configured or the
/// server is at its dictation capacity; otherwise hands the connection to a
/// fresh `DictationSocket`.
pub async fn live_transcript(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(
        "New dictation connection from: {:?}",
        req.connection_info().peer_addr()
    );

    let config = app_state.get_config();

    if config.speech.endpoint_url.trim().is_empty() {
        warn!("Dictation refused: no recognizer endpoint configured");
        return Ok(HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({"error": "Speech recognition is not configured"})));
    }

    if !app_state.try_begin_dictation() {
        warn!("Dictation refused: at capacity");
        return Ok(HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({"error": "Too many concurrent dictations"})));
    }

    let backend: Arc<dyn SpeechBackend> = Arc::new(crate::speech::backend::StreamingSttClient::new(
        config.speech.endpoint_url.clone(),
        config.speech.api_key.clone(),
    ));

    let socket = DictationSocket::new(
        app_state.clone(),
        backend,
        RecognitionConfig::from_config(&config.audio, &config.speech),
        FrameSpec::from_config(&config.audio),
        Duration::from_secs(config.speech.receive_timeout_secs),
        Duration::from_secs(config.speech.first_result_warn_secs),
    );

    let response = ws::start(socket, &req, stream);
    if response.is_err() {
        // The actor never started, so its stopped() hook won't release the
        // slot claimed above.
        app_state.end_dictation();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::types::RecognitionEvent;
    use anyhow::Result;
    use async_trait::async_trait;

    /// Backend that consumes whatever audio arrives and replays a scripted
    /// event sequence once the input side closes.
    struct ScriptedBackend {
        events: Vec<RecognitionEvent>,
    }

    #[async_trait]
    impl SpeechBackend for ScriptedBackend {
        async fn open_stream(
            &self,
            _config: &RecognitionConfig,
            mut audio: mpsc::Receiver<Vec<u8>>,
        ) -> Result<mpsc::Receiver<RecognitionEvent>> {
            let (tx, rx) = mpsc::channel(16);
            let events = self.events.clone();
            tokio::spawn(async move {
                // Drain the input side to exhaustion first, like a real
                // recognizer session that flushes results after input close.
                while audio.recv().await.is_some() {}
                for event in events {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    fn session_config() -> RecognitionConfig {
        let config = crate::config::AppConfig::default();
        RecognitionConfig::from_config(&config.audio, &config.speech)
    }

    /// Null frame before any audio: frame pulling stops, draining still runs
    /// to completion, and a silent session produces exactly one STATUS line.
    #[tokio::test]
    async fn test_immediate_input_close_yields_single_status_line() {
        let backend = ScriptedBackend { events: vec![] };
        let (audio_tx, audio_rx) = mpsc::channel(4);
        let mut events = backend
            .open_stream(&session_config(), audio_rx)
            .await
            .unwrap();

        // Client sends no audio at all, then end-of-stream.
        drop(audio_tx);

        let mut relay = EventRelay::new();
        let mut lines = Vec::new();
        while let Some(event) = events.recv().await {
            if let Some(line) = relay.on_event(event) {
                lines.push(line);
            }
        }
        if let Some(status) = relay.finish() {
            lines.push(status);
        }

        assert_eq!(lines.len(), 1);
        assert!(matches!(lines[0], ClientLine::Status(_)));
    }

    /// Events drain in submission order and no STATUS line follows a
    /// session that produced transcript.
    #[tokio::test]
    async fn test_drain_preserves_order() {
        let backend = ScriptedBackend {
            events: vec![
                RecognitionEvent::Interim("patient".into()),
                RecognitionEvent::Final("patient has fever".into()),
            ],
        };
        let (audio_tx, audio_rx) = mpsc::channel(4);
        let mut events = backend
            .open_stream(&session_config(), audio_rx)
            .await
            .unwrap();

        audio_tx.send(vec![0u8; 960]).await.unwrap();
        drop(audio_tx);

        let mut relay = EventRelay::new();
        let mut lines = Vec::new();
        while let Some(event) = events.recv().await {
            if let Some(line) = relay.on_event(event) {
                lines.push(line);
            }
        }
        if let Some(status) = relay.finish() {
            lines.push(status);
        }

        assert_eq!(
            lines,
            vec![
                ClientLine::Interim("patient".into()),
                ClientLine::Final("patient has fever".into()),
            ]
        );
    }
}
