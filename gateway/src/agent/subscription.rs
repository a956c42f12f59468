use std::collections::HashSet;

use tracing::{debug, info};

use crate::videosdk::{Participant, StreamKind};

/// Stream event handlers for one remote participant.
///
/// Remote audio streams are where caller audio would be tapped; they are
/// only logged here, the realtime pipeline receives audio on its own.
#[derive(Debug)]
pub struct ParticipantSubscription {
    agent_name: String,
    participant: Participant,
    active: HashSet<StreamKind>,
}

impl ParticipantSubscription {
    pub fn new(agent_name: &str, participant: Participant) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            participant,
            active: HashSet::new(),
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn is_streaming(&self, kind: StreamKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn on_stream_enabled(&mut self, kind: StreamKind) {
        self.active.insert(kind);
        if kind == StreamKind::Audio && !self.participant.local {
            info!(
                agent = %self.agent_name,
                participant_id = %self.participant.id,
                participant = %self.participant.display_name,
                "Receiving audio stream"
            );
        } else {
            debug!(
                agent = %self.agent_name,
                participant_id = %self.participant.id,
                kind = ?kind,
                "Stream enabled"
            );
        }
    }

    pub fn on_stream_disabled(&mut self, kind: StreamKind) {
        self.active.remove(&kind);
        if kind == StreamKind::Audio && !self.participant.local {
            info!(
                agent = %self.agent_name,
                participant_id = %self.participant.id,
                participant = %self.participant.display_name,
                "Audio stream stopped"
            );
        } else {
            debug!(
                agent = %self.agent_name,
                participant_id = %self.participant.id,
                kind = ?kind,
                "Stream disabled"
            );
        }
    }
}
