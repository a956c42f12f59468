//! Live agent sessions, keyed by session id.
//!
//! Each session runs on its own task. The registry keeps what is needed to
//! route room events to it and to cancel it on shutdown.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::session::AgentSession;
use crate::videosdk::{MeetingEvent, RoomId};

struct SessionEntry {
    room_id: RoomId,
    events: mpsc::Sender<MeetingEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Summary of a live session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub room_id: RoomId,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `session` on its own task. The entry removes itself when the
    /// session finishes.
    pub fn spawn(&self, session: AgentSession) -> Uuid {
        let session_id = Uuid::new_v4();
        let room_id = session.room_id().clone();
        let cancel = CancellationToken::new();

        self.sessions.insert(
            session_id,
            SessionEntry {
                room_id: room_id.clone(),
                events: session.event_sender(),
                cancel: cancel.clone(),
                handle: None,
            },
        );

        let sessions = self.sessions.clone();
        let handle = tokio::spawn(async move {
            match session.run(cancel).await {
                Ok(()) => info!(session_id = %session_id, room_id = %room_id, "Agent session finished"),
                Err(e) => error!(
                    session_id = %session_id,
                    room_id = %room_id,
                    error = %e,
                    "Agent session failed"
                ),
            }
            sessions.remove(&session_id);
        });

        // The task may already have removed its entry.
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.handle = Some(handle);
        }

        info!(session_id = %session_id, "Agent session started");
        session_id
    }

    /// Deliver `event` to every session in `room_id`. Returns how many
    /// sessions accepted it.
    pub fn dispatch(&self, room_id: &RoomId, event: MeetingEvent) -> usize {
        let targets: Vec<(Uuid, mpsc::Sender<MeetingEvent>)> = self
            .sessions
            .iter()
            .filter(|entry| &entry.room_id == room_id)
            .map(|entry| (*entry.key(), entry.events.clone()))
            .collect();

        let mut delivered = 0;
        for (session_id, events) in targets {
            match events.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    session_id = %session_id,
                    room_id = %room_id,
                    error = %e,
                    "Dropped meeting event"
                ),
            }
        }
        if delivered == 0 {
            debug!(room_id = %room_id, "No agent session for meeting event");
        }
        delivered
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| SessionInfo {
                session_id: *entry.key(),
                room_id: entry.room_id.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ask one session to leave its room. Returns false for unknown ids.
    pub fn cancel(&self, session_id: &Uuid) -> bool {
        match self.sessions.get(session_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every session and wait up to `timeout` for each to disconnect.
    pub async fn shutdown(&self, timeout: Duration) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, entry)) = self.sessions.remove(&id) {
                entry.cancel.cancel();
                if let Some(handle) = entry.handle {
                    handles.push((id, handle));
                }
            }
        }

        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "Stopping agent sessions");

        for (id, mut handle) in handles {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(session_id = %id, error = %e, "Agent session task failed"),
                Err(_) => {
                    warn!(session_id = %id, "Agent session did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
    }
}
