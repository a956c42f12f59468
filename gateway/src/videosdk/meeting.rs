//! Meeting participation seam.
//!
//! An agent session talks to the conferencing provider only through
//! [`MeetingTransport`]. Joining is asynchronous: the transport reports the
//! outcome, and everything that happens in the room afterwards, as
//! [`MeetingEvent`]s on the channel handed to [`MeetingTransport::join`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::rooms::{RoomError, RoomId, RoomProvisioner};

/// Settings used to join a room.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingConfig {
    pub meeting_id: RoomId,
    pub token: String,
    /// Display name of the joining participant
    pub name: String,
    pub mic_enabled: bool,
    pub webcam_enabled: bool,
    /// Subscribe to remote streams automatically
    pub auto_consume: bool,
}

impl MeetingConfig {
    /// Audio/video-off participant that consumes remote streams.
    pub fn listener(meeting_id: RoomId, token: String, name: String) -> Self {
        Self {
            meeting_id,
            token,
            name,
            mic_enabled: false,
            webcam_enabled: false,
            auto_consume: true,
        }
    }
}

/// A room participant as seen by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub display_name: String,
    /// True for the agent's own participant
    pub local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
    Share,
}

impl StreamKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.to_lowercase().as_str() {
            "audio" => Some(StreamKind::Audio),
            "video" => Some(StreamKind::Video),
            "share" | "screen" => Some(StreamKind::Share),
            _ => None,
        }
    }
}

/// Events delivered to an agent session.
///
/// `VideoSdkMeeting` and the room webhook produce the join, participant and
/// session events. `StreamEnabled` and `StreamDisabled` are only produced by a
/// media transport that consumes participant streams; none ships yet, so they
/// are the hook where caller audio relay plugs in.
#[derive(Debug, Clone, PartialEq)]
pub enum MeetingEvent {
    RoomJoined,
    RoomLeft { reason: Option<String> },
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    StreamEnabled {
        participant_id: String,
        kind: StreamKind,
    },
    StreamDisabled {
        participant_id: String,
        kind: StreamKind,
    },
    /// The provider ended the room session
    SessionEnded,
    Error(String),
}

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("Meeting event channel closed")]
    ChannelClosed,
}

/// Joins and ends rooms on behalf of agent sessions.
#[async_trait]
pub trait MeetingTransport: Send + Sync {
    /// Start joining. Returns once the join is under way; the outcome arrives
    /// as `RoomJoined` or `Error` on `events`.
    async fn join(
        &self,
        config: &MeetingConfig,
        events: mpsc::Sender<MeetingEvent>,
    ) -> Result<(), MeetingError>;

    /// End the room for every participant.
    async fn end(&self, room_id: &RoomId) -> Result<(), MeetingError>;
}

/// VideoSDK implementation backed by the room REST API.
///
/// Participant and session events reach the session through the meeting
/// webhook, so joining only has to confirm the room exists.
pub struct VideoSdkMeeting {
    rooms: Arc<RoomProvisioner>,
}

impl VideoSdkMeeting {
    pub fn new(rooms: Arc<RoomProvisioner>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl MeetingTransport for VideoSdkMeeting {
    async fn join(
        &self,
        config: &MeetingConfig,
        events: mpsc::Sender<MeetingEvent>,
    ) -> Result<(), MeetingError> {
        if events.is_closed() {
            return Err(MeetingError::ChannelClosed);
        }

        let rooms = self.rooms.clone();
        let room_id = config.meeting_id.clone();
        let name = config.name.clone();

        tokio::spawn(async move {
            let event = match rooms.validate_room(&room_id).await {
                Ok(()) => {
                    debug!(room_id = %room_id, participant = %name, "Joined meeting");
                    MeetingEvent::RoomJoined
                }
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Meeting join failed");
                    MeetingEvent::Error(format!("join failed: {e}"))
                }
            };
            if events.send(event).await.is_err() {
                debug!(room_id = %room_id, "Session gone before join completed");
            }
        });

        Ok(())
    }

    async fn end(&self, room_id: &RoomId) -> Result<(), MeetingError> {
        self.rooms.deactivate_room(room_id).await?;
        Ok(())
    }
}
