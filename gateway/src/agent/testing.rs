//! In-memory realtime provider and meeting transport for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::realtime::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeError,
    RealtimeErrorCallback, RealtimeFactory, RealtimeResult, TranscriptCallback,
};
use crate::videosdk::{MeetingConfig, MeetingError, MeetingEvent, MeetingTransport, RoomId};

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<String>>,
    error_cb: Mutex<Option<RealtimeErrorCallback>>,
    last_config: Mutex<Option<RealtimeConfig>>,
}

/// Realtime provider that records every call.
pub(crate) struct RecordingRealtime {
    shared: Arc<Shared>,
    fail_connect: bool,
    state: ConnectionState,
}

impl RecordingRealtime {
    fn record(&self, call: impl Into<String>) {
        self.shared.calls.lock().push(call.into());
    }
}

#[async_trait]
impl BaseRealtime for RecordingRealtime {
    async fn connect(&mut self) -> RealtimeResult<()> {
        self.record("connect");
        if self.fail_connect {
            self.state = ConnectionState::Failed;
            return Err(RealtimeError::ConnectionFailed("refused".to_string()));
        }
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.record("disconnect");
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> RealtimeResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(RealtimeError::NotConnected);
        }
        self.record(format!("say:{text}"));
        Ok(())
    }

    fn on_transcript(&mut self, _callback: TranscriptCallback) -> RealtimeResult<()> {
        Ok(())
    }

    fn on_error(&mut self, callback: RealtimeErrorCallback) -> RealtimeResult<()> {
        *self.shared.error_cb.lock() = Some(callback);
        Ok(())
    }
}

/// Factory handing out [`RecordingRealtime`]s that share one call log.
#[derive(Clone, Default)]
pub(crate) struct RecordingFactory {
    shared: Arc<Shared>,
    fail_connect: bool,
    created: Arc<AtomicUsize>,
}

impl RecordingFactory {
    pub(crate) fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().clone()
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn last_config(&self) -> Option<RealtimeConfig> {
        self.shared.last_config.lock().clone()
    }

    pub(crate) async fn emit_error(&self, err: RealtimeError) {
        let cb = self.shared.error_cb.lock().clone();
        if let Some(cb) = cb {
            cb(err).await;
        }
    }

    /// Wait until `call` shows up in the log.
    pub(crate) async fn wait_for(&self, call: &str) {
        for _ in 0..500 {
            if self.shared.calls.lock().iter().any(|c| c == call) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("`{call}` was never recorded, got {:?}", self.calls());
    }
}

impl RealtimeFactory for RecordingFactory {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
        self.created.fetch_add(1, Ordering::SeqCst);
        *self.shared.last_config.lock() = Some(config);
        Ok(Box::new(RecordingRealtime {
            shared: self.shared.clone(),
            fail_connect: self.fail_connect,
            state: ConnectionState::Disconnected,
        }))
    }
}

/// Meeting transport that confirms joins immediately and counts calls.
#[derive(Clone, Default)]
pub(crate) struct RecordingMeeting {
    pub(crate) joins: Arc<AtomicUsize>,
    pub(crate) ends: Arc<Mutex<Vec<RoomId>>>,
    /// Report a join error instead of `RoomJoined`
    pub(crate) reject_join: bool,
    /// Leave joins unanswered
    pub(crate) silent: bool,
}

impl RecordingMeeting {
    pub(crate) fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    pub(crate) fn ended(&self) -> Vec<RoomId> {
        self.ends.lock().clone()
    }
}

#[async_trait]
impl MeetingTransport for RecordingMeeting {
    async fn join(
        &self,
        _config: &MeetingConfig,
        events: mpsc::Sender<MeetingEvent>,
    ) -> Result<(), MeetingError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if self.silent {
            return Ok(());
        }
        let event = if self.reject_join {
            MeetingEvent::Error("room not found".to_string())
        } else {
            MeetingEvent::RoomJoined
        };
        events
            .send(event)
            .await
            .map_err(|_| MeetingError::ChannelClosed)
    }

    async fn end(&self, room_id: &RoomId) -> Result<(), MeetingError> {
        self.ends.lock().push(room_id.clone());
        Ok(())
    }
}
