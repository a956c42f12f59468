//! OpenAI Realtime API provider.
//!
//! Speech-to-speech conversation with a GPT-4o realtime model over WebSocket,
//! with server-side VAD for turn taking and whisper transcription of the
//! caller.

mod client;
mod messages;

pub use client::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeFactory,
};
