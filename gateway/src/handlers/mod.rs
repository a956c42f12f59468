//! HTTP request handlers
//!
//! - `api` - Liveness endpoint
//! - `calls` - Twilio inbound webhook and outbound call initiation
//! - `meeting_events` - VideoSDK meeting webhooks

pub mod api;
pub mod calls;
pub mod meeting_events;

pub use calls::{join_agent, outbound_call};
pub use meeting_events::meeting_webhook;
