//! VideoSDK conferencing integration.
//!
//! - `rooms`: room REST API (create, validate, deactivate)
//! - `meeting`: the join/end seam agent sessions are driven through
//! - `webhook`: participant and session webhooks pushed by VideoSDK

pub mod meeting;
pub mod rooms;
pub mod webhook;

pub use meeting::{
    MeetingConfig, MeetingError, MeetingEvent, MeetingTransport, Participant, StreamKind,
    VideoSdkMeeting,
};
pub use rooms::{RoomError, RoomId, RoomProvisioner, RoomResult};
pub use webhook::WebhookPayload;
