//! VideoSDK meeting webhook payloads.

use serde::Deserialize;

use super::meeting::{MeetingEvent, Participant};
use super::rooms::RoomId;

/// Body of a VideoSDK webhook call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub webhook_type: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    #[serde(default)]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub participant_name: Option<String>,
}

impl WebhookPayload {
    /// Map the payload to the room it concerns and the event for that room.
    ///
    /// Returns `None` for event types sessions do not react to and for
    /// payloads missing the fields the event needs.
    pub fn into_event(self) -> Option<(RoomId, MeetingEvent)> {
        let data = self.data;
        let room_id = RoomId::new(data.meeting_id.filter(|id| !id.is_empty())?);

        let participant = || {
            data.participant_id.clone().map(|id| Participant {
                id,
                display_name: data.participant_name.clone().unwrap_or_default(),
                local: false,
            })
        };

        let event = match self.webhook_type.as_str() {
            "participant-joined" => MeetingEvent::ParticipantJoined(participant()?),
            "participant-left" => MeetingEvent::ParticipantLeft(participant()?),
            "session-ended" => MeetingEvent::SessionEnded,
            _ => return None,
        };

        Some((room_id, event))
    }
}
