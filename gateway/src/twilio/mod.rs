//! Twilio telephony integration: REST calls, webhook signatures and TwiML.

pub mod client;
pub mod signature;
pub mod twiml;

pub use client::{CallInfo, TelephonyError, TwilioClient};
pub use signature::{RequestValidator, SIGNATURE_HEADER};
pub use twiml::{SipTarget, VoiceResponse};
