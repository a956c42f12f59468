//! OpenAI Realtime API client.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//!
//! The connection is not re-established when it drops. The error callback
//! receives a `ConnectionFailed` and the state moves to `Failed`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message, client::IntoClientRequest};
use url::Url;

use super::messages::{
    ClientEvent, InputAudioTranscription, ServerEvent, SessionConfig, TurnDetection,
};
use crate::core::realtime::base::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeError,
    RealtimeErrorCallback, RealtimeFactory, RealtimeResult, TranscriptCallback, TranscriptResult,
    TranscriptRole, TurnDetectionConfig,
};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model used when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Meeting audio is 16-bit PCM on both legs.
const AUDIO_FORMAT: &str = "pcm16";

const WS_CHANNEL_CAPACITY: usize = 256;

/// Upper bound for the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for flushing queued events and closing the socket.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Registered callbacks, shared with the connection task.
#[derive(Default)]
struct Callbacks {
    transcript: Mutex<Option<TranscriptCallback>>,
    error: Mutex<Option<RealtimeErrorCallback>>,
}

impl Callbacks {
    async fn emit_error(&self, err: RealtimeError) {
        let cb = self.error.lock().clone();
        match cb {
            Some(cb) => cb(err).await,
            None => tracing::warn!("Realtime error without handler: {}", err),
        }
    }

    async fn emit_transcript(&self, transcript: TranscriptResult) {
        let cb = self.transcript.lock().clone();
        if let Some(cb) = cb {
            cb(transcript).await;
        }
    }
}

/// OpenAI Realtime API client.
///
/// Outgoing events go through an mpsc channel into a single connection task
/// that owns the socket. Incoming events are dispatched to the registered
/// callbacks from that same task, so callbacks should return quickly.
///
/// `disconnect` drops the sending half and waits for the task to write every
/// queued event and a Close frame, so a final `say` still reaches the model.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    ws_url: String,
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag shared with the connection task
    connected: Arc<AtomicBool>,
    /// Set before an intentional close so the task does not report a loss
    closing: Arc<AtomicBool>,
    ws_sender: Option<mpsc::Sender<ClientEvent>>,
    callbacks: Arc<Callbacks>,
    connection_handle: Option<JoinHandle<()>>,
    disconnect_timeout: Duration,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }
        let ws_url = Self::build_ws_url(&config)?;

        Ok(Self {
            config,
            ws_url,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            closing: Arc::new(AtomicBool::new(false)),
            ws_sender: None,
            callbacks: Arc::new(Callbacks::default()),
            connection_handle: None,
            disconnect_timeout: DISCONNECT_TIMEOUT,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Model id sent to the server, exactly as configured.
    pub fn model(&self) -> &str {
        model_or_default(&self.config)
    }

    fn build_ws_url(config: &RealtimeConfig) -> RealtimeResult<String> {
        let endpoint = config.endpoint.as_deref().unwrap_or(OPENAI_REALTIME_URL);
        let mut url = Url::parse(endpoint).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("invalid endpoint '{endpoint}': {e}"))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "endpoint must use ws or wss, got '{}'",
                url.scheme()
            )));
        }
        url.query_pairs_mut()
            .append_pair("model", model_or_default(config));
        Ok(url.into())
    }

    fn build_session_config(&self) -> SessionConfig {
        let config = &self.config;
        SessionConfig {
            modalities: Some(
                config
                    .modalities
                    .clone()
                    .unwrap_or_else(|| vec!["text".to_string(), "audio".to_string()]),
            ),
            voice: config.voice.clone().filter(|v| !v.trim().is_empty()),
            instructions: config.instructions.clone(),
            input_audio_format: Some(AUDIO_FORMAT.to_string()),
            output_audio_format: Some(AUDIO_FORMAT.to_string()),
            input_audio_transcription: config.input_audio_transcription.as_ref().map(|t| {
                InputAudioTranscription {
                    model: t.model.clone(),
                }
            }),
            turn_detection: config.turn_detection.as_ref().and_then(|td| match td {
                TurnDetectionConfig::ServerVad {
                    threshold,
                    prefix_padding_ms,
                    silence_duration_ms,
                } => Some(TurnDetection::ServerVad {
                    threshold: *threshold,
                    prefix_padding_ms: *prefix_padding_ms,
                    silence_duration_ms: *silence_duration_ms,
                }),
                TurnDetectionConfig::None => None,
            }),
            tool_choice: config.tool_choice.clone(),
        }
    }

    async fn handle_server_event(
        event: ServerEvent,
        callbacks: &Callbacks,
        assistant_transcript: &mut String,
    ) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!(
                    session_id = %session.id,
                    model = session.model.as_deref().unwrap_or("unknown"),
                    "OpenAI Realtime session created"
                );
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::debug!(session_id = %session.id, "OpenAI Realtime session updated");
            }

            ServerEvent::Error { error } => {
                tracing::error!(
                    error_type = %error.error_type,
                    code = error.code.as_deref().unwrap_or(""),
                    "OpenAI Realtime error: {}",
                    error.message
                );
                let message = format!("{}: {}", error.error_type, error.message);
                let err = if error.is_session_fatal() {
                    RealtimeError::AuthenticationFailed(message)
                } else {
                    RealtimeError::ProviderError(message)
                };
                callbacks.emit_error(err).await;
            }

            ServerEvent::TranscriptionCompleted {
                item_id,
                transcript,
            } => {
                callbacks
                    .emit_transcript(TranscriptResult {
                        text: transcript,
                        role: TranscriptRole::User,
                        is_final: true,
                        item_id: Some(item_id),
                    })
                    .await;
            }

            ServerEvent::AudioTranscriptDelta { delta, item_id } => {
                assistant_transcript.push_str(&delta);
                callbacks
                    .emit_transcript(TranscriptResult {
                        text: assistant_transcript.clone(),
                        role: TranscriptRole::Assistant,
                        is_final: false,
                        item_id,
                    })
                    .await;
            }

            ServerEvent::AudioTranscriptDone {
                transcript,
                item_id,
            } => {
                assistant_transcript.clear();
                callbacks
                    .emit_transcript(TranscriptResult {
                        text: transcript,
                        role: TranscriptRole::Assistant,
                        is_final: true,
                        item_id,
                    })
                    .await;
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!(
                    response_id = %response.id,
                    status = response.status.as_deref().unwrap_or("unknown"),
                    "Response done"
                );
            }

            ServerEvent::Other => {
                tracing::trace!("Unhandled server event");
            }
        }
    }

    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.ws_sender.as_ref().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    fn map_handshake_error(err: tungstenite::Error) -> RealtimeError {
        match err {
            tungstenite::Error::Http(response)
                if response.status() == http::StatusCode::UNAUTHORIZED
                    || response.status() == http::StatusCode::FORBIDDEN =>
            {
                RealtimeError::AuthenticationFailed(format!(
                    "handshake rejected with status {}",
                    response.status()
                ))
            }
            other => RealtimeError::ConnectionFailed(other.to_string()),
        }
    }
}

fn model_or_default(config: &RealtimeConfig) -> &str {
    let model = config.model.trim();
    if model.is_empty() {
        DEFAULT_REALTIME_MODEL
    } else {
        model
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn connect(&mut self) -> RealtimeResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.closing.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connecting;

        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert(http::header::AUTHORIZATION, auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let handshake =
            tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request)).await;
        let ws_stream = match handshake {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                *self.state.write() = ConnectionState::Failed;
                return Err(Self::map_handshake_error(e));
            }
            Err(_) => {
                *self.state.write() = ConnectionState::Failed;
                return Err(RealtimeError::Timeout(format!(
                    "no handshake response within {}s",
                    CONNECT_TIMEOUT.as_secs()
                )));
            }
        };

        tracing::info!(model = self.model(), "Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        self.ws_sender = Some(tx);

        let callbacks = self.callbacks.clone();
        let state = self.state.clone();
        let connected = self.connected.clone();
        let closing = self.closing.clone();

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        let handle = tokio::spawn(async move {
            let mut assistant_transcript = String::new();

            let reason = loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        // None only once every queued event has been written
                        let Some(event) = outgoing else {
                            if let Err(e) = ws_sink.close().await {
                                tracing::debug!("Close frame not sent: {}", e);
                            }
                            break None;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            break Some(format!("send failed: {e}"));
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        Self::handle_server_event(
                                            event,
                                            &callbacks,
                                            &mut assistant_transcript,
                                        )
                                        .await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse server event: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break Some(format!("closed by server: {frame:?}"));
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break Some(format!("WebSocket error: {e}")),
                            None => break Some("stream ended".to_string()),
                        }
                    }
                }
            };

            connected.store(false, Ordering::SeqCst);

            if closing.load(Ordering::SeqCst) {
                *state.write() = ConnectionState::Disconnected;
                return;
            }

            *state.write() = ConnectionState::Failed;
            let reason = reason.unwrap_or_else(|| "sender dropped".to_string());
            tracing::warn!(reason = %reason, "OpenAI Realtime connection lost");
            callbacks
                .emit_error(RealtimeError::ConnectionFailed(reason))
                .await;
        });

        self.connection_handle = Some(handle);

        let session = self.build_session_config();
        self.send_event(ClientEvent::SessionUpdate { session }).await
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.closing.store(true, Ordering::SeqCst);
        // Dropping the only sender lets the task drain its queue and close
        self.ws_sender = None;

        if let Some(mut handle) = self.connection_handle.take() {
            match tokio::time::timeout(self.disconnect_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => tracing::error!("Realtime connection task panicked: {}", e),
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.disconnect_timeout.as_millis() as u64,
                        "Realtime connection did not close in time, aborting"
                    );
                    handle.abort();
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;

        tracing::info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    async fn say(&mut self, text: &str) -> RealtimeResult<()> {
        self.send_event(ClientEvent::speak(text)).await
    }

    fn on_transcript(&mut self, callback: TranscriptCallback) -> RealtimeResult<()> {
        *self.callbacks.transcript.lock() = Some(callback);
        Ok(())
    }

    fn on_error(&mut self, callback: RealtimeErrorCallback) -> RealtimeResult<()> {
        *self.callbacks.error.lock() = Some(callback);
        Ok(())
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

/// Creates [`OpenAIRealtime`] clients for new conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAIRealtimeFactory;

impl RealtimeFactory for OpenAIRealtimeFactory {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
        Ok(Box::new(OpenAIRealtime::new(config)?))
    }
}
