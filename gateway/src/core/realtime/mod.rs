//! Realtime conversation provider module.
//!
//! This module provides the abstraction over hosted speech-to-speech models
//! and the OpenAI Realtime implementation used for the agent.
//!
//! # Architecture
//!
//! - `BaseRealtime` trait for provider abstraction
//! - `RealtimeFactory` so each conversation gets a fresh connection
//! - Callback-based event handling
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge_gateway::core::realtime::{OpenAIRealtimeFactory, RealtimeConfig, RealtimeFactory};
//!
//! let factory = OpenAIRealtimeFactory;
//! let mut provider = factory.create(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     ..Default::default()
//! })?;
//! provider.connect().await?;
//! provider.say("Hello, how are you?").await?;
//! ```

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, InputTranscriptionConfig, RealtimeConfig,
    RealtimeError, RealtimeErrorCallback, RealtimeFactory, RealtimeResult, TranscriptCallback,
    TranscriptResult, TranscriptRole, TurnDetectionConfig,
};
pub use openai::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeFactory,
};
