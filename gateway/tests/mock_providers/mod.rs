//! Mock Providers for Testing
//!
//! In-process stand-ins for the meeting transport and the realtime model so
//! call flows can be exercised without VideoSDK or OpenAI.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use callbridge_gateway::core::realtime::{
    BaseRealtime, BoxedRealtime, ConnectionState, RealtimeConfig, RealtimeErrorCallback,
    RealtimeFactory, RealtimeResult, TranscriptCallback,
};
use callbridge_gateway::videosdk::{
    MeetingConfig, MeetingError, MeetingEvent, MeetingTransport, RoomId,
};

/// Meeting transport that confirms every join.
#[derive(Clone, Default)]
pub struct MockMeeting {
    joined: Arc<Mutex<Vec<MeetingConfig>>>,
    ended: Arc<Mutex<Vec<RoomId>>>,
}

impl MockMeeting {
    pub fn joined(&self) -> Vec<MeetingConfig> {
        self.joined.lock().clone()
    }

    pub fn ended(&self) -> Vec<RoomId> {
        self.ended.lock().clone()
    }

    pub async fn wait_for_end(&self, room: &RoomId) {
        wait_until(|| self.ended.lock().contains(room), "room end").await;
    }
}

#[async_trait]
impl MeetingTransport for MockMeeting {
    async fn join(
        &self,
        config: &MeetingConfig,
        events: mpsc::Sender<MeetingEvent>,
    ) -> Result<(), MeetingError> {
        self.joined.lock().push(config.clone());
        events
            .send(MeetingEvent::RoomJoined)
            .await
            .map_err(|_| MeetingError::ChannelClosed)
    }

    async fn end(&self, room_id: &RoomId) -> Result<(), MeetingError> {
        self.ended.lock().push(room_id.clone());
        Ok(())
    }
}

/// Realtime factory whose providers log what the agent says.
#[derive(Clone, Default)]
pub struct MockRealtimeFactory {
    calls: Arc<Mutex<Vec<String>>>,
    configs: Arc<Mutex<Vec<RealtimeConfig>>>,
}

impl MockRealtimeFactory {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn configs(&self) -> Vec<RealtimeConfig> {
        self.configs.lock().clone()
    }

    pub async fn wait_for(&self, call: &str) {
        wait_until(|| self.calls.lock().iter().any(|c| c == call), call).await;
    }
}

impl RealtimeFactory for MockRealtimeFactory {
    fn create(&self, config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
        self.configs.lock().push(config);
        Ok(Box::new(MockRealtime {
            calls: self.calls.clone(),
            state: ConnectionState::Disconnected,
        }))
    }
}

struct MockRealtime {
    calls: Arc<Mutex<Vec<String>>>,
    state: ConnectionState,
}

#[async_trait]
impl BaseRealtime for MockRealtime {
    async fn connect(&mut self) -> RealtimeResult<()> {
        self.calls.lock().push("connect".to_string());
        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.calls.lock().push("disconnect".to_string());
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> RealtimeResult<()> {
        self.calls.lock().push(format!("say:{text}"));
        Ok(())
    }

    fn on_transcript(&mut self, _callback: TranscriptCallback) -> RealtimeResult<()> {
        Ok(())
    }

    fn on_error(&mut self, _callback: RealtimeErrorCallback) -> RealtimeResult<()> {
        Ok(())
    }
}

async fn wait_until(mut done: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
