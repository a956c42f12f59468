//! Agent session: the AI participant of one room for the length of a call.
//!
//! A session is owned by a single task. Room events arrive on its channel and
//! are applied through `&mut self`, so none of its state needs a lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::driver::{ConversationDriver, DriverContext, DriverError, DriverTask};
use super::subscription::ParticipantSubscription;
use crate::videosdk::{
    MeetingConfig, MeetingError, MeetingEvent, MeetingTransport, Participant, RoomId, StreamKind,
};

/// Capacity of a session's event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default bound for driver shutdown.
pub const DEFAULT_DRIVER_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Agent session is not initialized: {0}")]
    NotInitialized(String),

    #[error("Agent session is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Meeting(#[from] MeetingError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn MeetingTransport>,
    pub driver: ConversationDriver,
    /// Display name of the bridged SIP caller
    pub bridge_identity: String,
    pub driver_stop_timeout: Duration,
}

pub struct AgentSession {
    room_id: RoomId,
    display_name: String,
    /// Meeting settings, or why they could not be built
    meeting: Result<MeetingConfig, String>,
    deps: SessionDeps,
    state: SessionState,
    subscriptions: HashMap<String, ParticipantSubscription>,
    driver: Option<DriverTask>,
    /// Participant whose arrival started the driver
    bridge_participant: Option<String>,
    events_tx: mpsc::Sender<MeetingEvent>,
    events_rx: Option<mpsc::Receiver<MeetingEvent>>,
    finished: bool,
}

impl AgentSession {
    /// Build a session for `room_id`.
    ///
    /// Never fails: invalid input leaves the session uninitialized and every
    /// later operation reports `NotInitialized`.
    pub fn initialize(room_id: RoomId, token: &str, display_name: &str, deps: SessionDeps) -> Self {
        let meeting = if room_id.as_str().trim().is_empty() {
            Err("room id is empty".to_string())
        } else if token.trim().is_empty() {
            Err("meeting token is empty".to_string())
        } else if display_name.trim().is_empty() {
            Err("display name is empty".to_string())
        } else {
            Ok(MeetingConfig::listener(
                room_id.clone(),
                token.to_string(),
                display_name.to_string(),
            ))
        };

        match &meeting {
            Ok(_) => info!(room_id = %room_id, agent = %display_name, "Agent session initialized"),
            Err(reason) => {
                error!(room_id = %room_id, reason = %reason, "Agent session failed to initialize")
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            room_id,
            display_name: display_name.to_string(),
            meeting,
            deps,
            state: SessionState::Disconnected,
            subscriptions: HashMap::new(),
            driver: None,
            bridge_participant: None,
            events_tx,
            events_rx: Some(events_rx),
            finished: false,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.meeting.is_ok()
    }

    /// True once the call is over and the session should be torn down.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn has_subscription(&self, participant_id: &str) -> bool {
        self.subscriptions.contains_key(participant_id)
    }

    pub fn has_live_driver(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| !d.is_finished())
    }

    /// Sender for room events addressed to this session.
    pub fn event_sender(&self) -> mpsc::Sender<MeetingEvent> {
        self.events_tx.clone()
    }

    fn not_initialized(&self) -> SessionError {
        let reason = match &self.meeting {
            Err(reason) => reason.clone(),
            Ok(_) => "unknown".to_string(),
        };
        error!(room_id = %self.room_id, reason = %reason, "Agent session is not initialized");
        SessionError::NotInitialized(reason)
    }

    /// Ask the transport to join. `Connected` is set by the `RoomJoined` event.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        let config = match &self.meeting {
            Ok(config) => config.clone(),
            Err(_) => return Err(self.not_initialized()),
        };

        if self.state != SessionState::Disconnected {
            warn!(room_id = %self.room_id, state = ?self.state, "Already connecting or connected");
            return Ok(());
        }

        info!(room_id = %self.room_id, agent = %self.display_name, "Joining meeting");
        self.state = SessionState::Connecting;

        if let Err(e) = self.deps.transport.join(&config, self.events_tx.clone()).await {
            error!(room_id = %self.room_id, error = %e, "Meeting join request failed");
            self.state = SessionState::Disconnected;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop the driver, end the room and drop all subscriptions.
    ///
    /// Subscriptions are cleared and the state reset even when a step fails;
    /// the first failure is returned.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        if !self.is_initialized() {
            return Err(self.not_initialized());
        }
        if self.state == SessionState::Disconnected && self.driver.is_none() {
            warn!(room_id = %self.room_id, "Disconnect requested but session is not connected");
            return Ok(());
        }

        info!(room_id = %self.room_id, "Leaving meeting");

        let driver_result = match self.driver.take() {
            Some(task) => task
                .stop(self.deps.driver_stop_timeout)
                .await
                .map_err(SessionError::from),
            None => Ok(()),
        };

        let end_result = self
            .deps
            .transport
            .end(&self.room_id)
            .await
            .map_err(SessionError::from);

        self.subscriptions.clear();
        self.bridge_participant = None;
        self.state = SessionState::Disconnected;

        if let Err(ref e) = driver_result {
            error!(room_id = %self.room_id, error = %e, "Conversation driver stopped with error");
        }
        if let Err(ref e) = end_result {
            error!(room_id = %self.room_id, error = %e, "Failed to end meeting");
        }
        driver_result.and(end_result)
    }

    pub async fn handle_event(&mut self, event: MeetingEvent) {
        if !self.is_initialized() {
            debug!(room_id = %self.room_id, event = ?event, "Event for uninitialized session");
            return;
        }
        match event {
            MeetingEvent::RoomJoined => self.on_room_joined(),
            MeetingEvent::RoomLeft { reason } => self.on_room_left(reason),
            MeetingEvent::ParticipantJoined(participant) => self.on_participant_joined(participant),
            MeetingEvent::ParticipantLeft(participant) => self.on_participant_left(participant),
            MeetingEvent::StreamEnabled {
                participant_id,
                kind,
            } => self.on_stream_enabled(&participant_id, kind),
            MeetingEvent::StreamDisabled {
                participant_id,
                kind,
            } => self.on_stream_disabled(&participant_id, kind),
            MeetingEvent::SessionEnded => {
                info!(room_id = %self.room_id, "Meeting session ended");
                self.finished = true;
            }
            MeetingEvent::Error(message) => self.on_error(&message),
        }
    }

    fn on_room_joined(&mut self) {
        info!(room_id = %self.room_id, agent = %self.display_name, "Meeting joined");
        self.state = SessionState::Connected;
    }

    fn on_room_left(&mut self, reason: Option<String>) {
        info!(
            room_id = %self.room_id,
            reason = reason.as_deref().unwrap_or("none"),
            "Meeting left"
        );
        self.state = SessionState::Disconnected;
        self.finished = true;
    }

    fn on_participant_joined(&mut self, participant: Participant) {
        info!(
            room_id = %self.room_id,
            participant_id = %participant.id,
            participant = %participant.display_name,
            local = participant.local,
            "Participant joined"
        );
        if participant.local {
            return;
        }

        let bridge_id =
            (participant.display_name == self.deps.bridge_identity).then(|| participant.id.clone());
        self.subscriptions
            .entry(participant.id.clone())
            .or_insert_with(|| ParticipantSubscription::new(&self.display_name, participant));

        if let Some(id) = bridge_id {
            self.start_driver(id);
        }
    }

    fn on_participant_left(&mut self, participant: Participant) {
        info!(
            room_id = %self.room_id,
            participant_id = %participant.id,
            participant = %participant.display_name,
            "Participant left"
        );
        if self.subscriptions.remove(&participant.id).is_none() {
            debug!(participant_id = %participant.id, "No subscription to remove");
        }
        if self.bridge_participant.as_deref() == Some(participant.id.as_str()) {
            info!(room_id = %self.room_id, "Caller left, ending session");
            self.finished = true;
        }
    }

    fn on_stream_enabled(&mut self, participant_id: &str, kind: StreamKind) {
        match self.subscriptions.get_mut(participant_id) {
            Some(sub) => sub.on_stream_enabled(kind),
            None => debug!(participant_id, "Stream enabled for unknown participant"),
        }
    }

    fn on_stream_disabled(&mut self, participant_id: &str, kind: StreamKind) {
        match self.subscriptions.get_mut(participant_id) {
            Some(sub) => sub.on_stream_disabled(kind),
            None => debug!(participant_id, "Stream disabled for unknown participant"),
        }
    }

    fn on_error(&mut self, message: &str) {
        error!(room_id = %self.room_id, error = %message, "Meeting error");
        if self.state == SessionState::Connecting {
            self.state = SessionState::Disconnected;
            self.finished = true;
        }
    }

    fn start_driver(&mut self, participant_id: String) {
        if self.has_live_driver() {
            warn!(
                room_id = %self.room_id,
                participant_id = %participant_id,
                "Conversation driver already running"
            );
            return;
        }
        let Ok(meeting) = &self.meeting else {
            return;
        };

        info!(
            room_id = %self.room_id,
            participant_id = %participant_id,
            "Caller present, starting conversation driver"
        );
        let ctx = DriverContext {
            room_id: self.room_id.clone(),
            display_name: self.display_name.clone(),
            credential: meeting.token.clone(),
        };
        self.driver = Some(DriverTask::spawn(self.deps.driver.clone(), ctx));
        self.bridge_participant = Some(participant_id);
    }

    /// Join the room and process events until the call ends or `cancel` fires,
    /// then disconnect.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), SessionError> {
        let mut events = self.events_rx.take().ok_or(SessionError::AlreadyRunning)?;

        self.connect().await?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(room_id = %self.room_id, "Agent session cancelled");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event).await;
                    if self.finished {
                        break;
                    }
                }
            }
        }

        self.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::driver::DriverSettings;
    use crate::agent::testing::{RecordingFactory, RecordingMeeting};
    use crate::config::test_config;

    fn deps(meeting: &RecordingMeeting, factory: &RecordingFactory) -> SessionDeps {
        SessionDeps {
            transport: Arc::new(meeting.clone()),
            driver: ConversationDriver::new(
                Arc::new(factory.clone()),
                DriverSettings::from_config(&test_config()),
            ),
            bridge_identity: "SIP User".to_string(),
            driver_stop_timeout: Duration::from_secs(5),
        }
    }

    fn session(meeting: &RecordingMeeting, factory: &RecordingFactory) -> AgentSession {
        AgentSession::initialize(
            RoomId::new("r-1"),
            "vsdk-token",
            "AI Assistant",
            deps(meeting, factory),
        )
    }

    fn participant(id: &str, name: &str) -> Participant {
        Participant {
            id: id.to_string(),
            display_name: name.to_string(),
            local: false,
        }
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_is_noop() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(meeting.ended().is_empty());
    }

    #[tokio::test]
    async fn test_connect_twice_joins_once() {
        let meeting = RecordingMeeting {
            silent: true,
            ..Default::default()
        };
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);

        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(meeting.join_count(), 1);
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn test_connected_only_after_join_event() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);
        let mut events = session.events_rx.take().unwrap();

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Connecting);

        let event = events.recv().await.unwrap();
        session.handle_event(event).await;
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_uninitialized_session_reports_errors() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = AgentSession::initialize(
            RoomId::new("r-1"),
            "",
            "AI Assistant",
            deps(&meeting, &factory),
        );

        assert!(!session.is_initialized());
        assert!(matches!(
            session.connect().await,
            Err(SessionError::NotInitialized(_))
        ));
        assert!(matches!(
            session.disconnect().await,
            Err(SessionError::NotInitialized(_))
        ));
        assert_eq!(meeting.join_count(), 0);
    }

    #[tokio::test]
    async fn test_participant_left_without_subscription_is_idempotent() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);

        session
            .handle_event(MeetingEvent::ParticipantLeft(participant("ghost", "Someone")))
            .await;
        session
            .handle_event(MeetingEvent::ParticipantLeft(participant("ghost", "Someone")))
            .await;
        assert_eq!(session.subscription_count(), 0);
        assert!(!session.is_finished());
    }

    #[tokio::test]
    async fn test_subscriptions_track_remote_participants() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);

        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("p-1", "Alice")))
            .await;
        session
            .handle_event(MeetingEvent::ParticipantJoined(Participant {
                id: "self".to_string(),
                display_name: "AI Assistant".to_string(),
                local: true,
            }))
            .await;
        session
            .handle_event(MeetingEvent::StreamEnabled {
                participant_id: "p-1".to_string(),
                kind: StreamKind::Audio,
            })
            .await;
        assert_eq!(session.subscription_count(), 1);
        assert!(session.has_subscription("p-1"));
        assert!(!session.has_subscription("self"));
        assert!(!session.has_live_driver());

        session
            .handle_event(MeetingEvent::ParticipantLeft(participant("p-1", "Alice")))
            .await;
        assert_eq!(session.subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_bridge_participant_starts_single_driver() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);
        session.handle_event(MeetingEvent::RoomJoined).await;

        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("sip-1", "SIP User")))
            .await;
        factory.wait_for("say:Hello, how are you?").await;
        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("sip-2", "SIP User")))
            .await;

        assert!(session.has_live_driver());
        assert_eq!(factory.created(), 1);
        assert_eq!(session.subscription_count(), 2);

        session.disconnect().await.unwrap();
        assert!(!session.has_live_driver());
        assert_eq!(session.subscription_count(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(meeting.ended(), vec![RoomId::new("r-1")]);
        assert!(factory.calls().contains(&"say:Goodbye!".to_string()));

        // A second disconnect is a warning, not an error.
        session.disconnect().await.unwrap();
        assert_eq!(meeting.ended().len(), 1);
    }

    #[tokio::test]
    async fn test_only_the_driving_caller_ends_the_session() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let mut session = session(&meeting, &factory);
        session.handle_event(MeetingEvent::RoomJoined).await;

        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("sip-1", "SIP User")))
            .await;
        factory.wait_for("say:Hello, how are you?").await;
        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("sip-2", "SIP User")))
            .await;

        session
            .handle_event(MeetingEvent::ParticipantLeft(participant("sip-2", "SIP User")))
            .await;
        assert!(!session.is_finished());
        assert!(session.has_subscription("sip-1"));
        assert!(session.has_live_driver());
        assert!(meeting.ended().is_empty());

        session
            .handle_event(MeetingEvent::ParticipantLeft(participant("sip-1", "SIP User")))
            .await;
        assert!(session.is_finished());

        session.disconnect().await.unwrap();
        assert_eq!(meeting.ended(), vec![RoomId::new("r-1")]);
    }

    #[tokio::test]
    async fn test_disconnect_propagates_driver_failure_and_still_cleans_up() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::failing_connect();
        let mut session = session(&meeting, &factory);
        session.handle_event(MeetingEvent::RoomJoined).await;
        session
            .handle_event(MeetingEvent::ParticipantJoined(participant("sip-1", "SIP User")))
            .await;
        factory.wait_for("disconnect").await;

        assert!(matches!(
            session.disconnect().await,
            Err(SessionError::Driver(_))
        ));
        assert_eq!(session.subscription_count(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(meeting.ended().len(), 1);
    }

    #[tokio::test]
    async fn test_join_error_marks_disconnected() {
        let meeting = RecordingMeeting {
            reject_join: true,
            ..Default::default()
        };
        let factory = RecordingFactory::default();
        let session = session(&meeting, &factory);

        session.run(CancellationToken::new()).await.unwrap();
        assert_eq!(meeting.join_count(), 1);
        assert!(meeting.ended().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_caller_leaves() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let session = session(&meeting, &factory);
        let events = session.event_sender();

        let task = tokio::spawn(session.run(CancellationToken::new()));
        events
            .send(MeetingEvent::ParticipantJoined(participant("sip-1", "SIP User")))
            .await
            .unwrap();
        factory.wait_for("say:Hello, how are you?").await;
        events
            .send(MeetingEvent::ParticipantLeft(participant("sip-1", "SIP User")))
            .await
            .unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(meeting.ended(), vec![RoomId::new("r-1")]);
        assert!(factory.calls().ends_with(&[
            "say:Goodbye!".to_string(),
            "disconnect".to_string()
        ]));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let meeting = RecordingMeeting::default();
        let factory = RecordingFactory::default();
        let session = session(&meeting, &factory);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(session.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        task.await.unwrap().unwrap();
        assert_eq!(meeting.join_count(), 1);
        assert_eq!(meeting.ended().len(), 1);
    }
}
