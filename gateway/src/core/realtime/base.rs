//! Provider abstraction for realtime conversations.
//!
//! The driver only needs to open a conversation, make the assistant speak,
//! hear about transcripts and failures, and close it again. Everything a
//! provider exposes beyond that stays inside the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed or was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Error event reported by the provider
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not connected")]
    NotConnected,
}

impl RealtimeError {
    /// Whether the conversation cannot continue after this error.
    ///
    /// Provider error events (bad event, rate limit on a single response) are
    /// reported but leave the session usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RealtimeError::ProviderError(_))
    }
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Conversation settings handed to a provider.
///
/// `model` and `voice` are sent to the provider verbatim so new model
/// snapshots work without a release.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub api_key: String,

    /// Model id, provider default when empty
    #[serde(default)]
    pub model: String,

    /// WebSocket endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    #[serde(default)]
    pub input_audio_transcription: Option<InputTranscriptionConfig>,

    #[serde(default)]
    pub turn_detection: Option<TurnDetectionConfig>,

    /// Tool choice strategy ("auto", "none", "required")
    #[serde(default)]
    pub tool_choice: Option<String>,

    /// Response modalities
    #[serde(default)]
    pub modalities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTranscriptionConfig {
    /// Transcription model, e.g. "whisper-1"
    pub model: String,
}

/// Turn detection (VAD) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(default)]
        threshold: Option<f32>,
        #[serde(default)]
        prefix_padding_ms: Option<u32>,
        #[serde(default)]
        silence_duration_ms: Option<u32>,
    },
    /// Turns are committed by the client
    #[serde(rename = "none")]
    None,
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: Some(0.5),
            prefix_padding_ms: Some(300),
            silence_duration_ms: Some(200),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Connection lost or refused
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// A transcribed turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub role: TranscriptRole,
    /// False for assistant transcripts still being streamed
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => f.write_str("user"),
            TranscriptRole::Assistant => f.write_str("assistant"),
        }
    }
}

pub type TranscriptCallback =
    Arc<dyn Fn(TranscriptResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub type RealtimeErrorCallback =
    Arc<dyn Fn(RealtimeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// One realtime conversation with a hosted speech model.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Connect and apply the session configuration.
    async fn connect(&mut self) -> RealtimeResult<()>;

    /// Flush anything already sent and close. Safe to call when not connected.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    /// Have the assistant speak `text` verbatim.
    async fn say(&mut self, text: &str) -> RealtimeResult<()>;

    fn on_transcript(&mut self, callback: TranscriptCallback) -> RealtimeResult<()>;

    /// Register a callback for error events, including connection loss.
    fn on_error(&mut self, callback: RealtimeErrorCallback) -> RealtimeResult<()>;
}

pub type BoxedRealtime = Box<dyn BaseRealtime>;

/// Creates a fresh provider for every conversation.
pub trait RealtimeFactory: Send + Sync {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<BoxedRealtime>;
}
