use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::agent::{
    ConversationDriver, DEFAULT_DRIVER_STOP_TIMEOUT, DriverSettings, SessionDeps, SessionRegistry,
};
use crate::config::ServerConfig;
use crate::core::{OpenAIRealtimeFactory, RealtimeFactory};
use crate::twilio::TwilioClient;
use crate::videosdk::{MeetingTransport, RoomProvisioner, VideoSdkMeeting};

/// Path VideoSDK pushes meeting webhooks to.
pub const MEETING_WEBHOOK_PATH: &str = "/videosdk/webhook";

/// Application state shared across all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub rooms: Arc<RoomProvisioner>,
    pub twilio: TwilioClient,
    pub meeting: Arc<dyn MeetingTransport>,
    pub driver: ConversationDriver,
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Build state backed by the real VideoSDK and OpenAI providers.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let rooms = Arc::new(RoomProvisioner::new(
            &config.videosdk,
            meeting_webhook_url(&config),
        ));
        let meeting: Arc<dyn MeetingTransport> = Arc::new(VideoSdkMeeting::new(rooms.clone()));
        Self::assemble(config, rooms, meeting, Arc::new(OpenAIRealtimeFactory))
    }

    /// Build state with custom meeting and realtime providers.
    pub fn with_providers(
        config: ServerConfig,
        meeting: Arc<dyn MeetingTransport>,
        realtime: Arc<dyn RealtimeFactory>,
    ) -> Arc<Self> {
        let rooms = Arc::new(RoomProvisioner::new(
            &config.videosdk,
            meeting_webhook_url(&config),
        ));
        Self::assemble(config, rooms, meeting, realtime)
    }

    fn assemble(
        config: ServerConfig,
        rooms: Arc<RoomProvisioner>,
        meeting: Arc<dyn MeetingTransport>,
        realtime: Arc<dyn RealtimeFactory>,
    ) -> Arc<Self> {
        if !rooms.is_configured() {
            warn!("VIDEOSDK_AUTH_TOKEN not set, room requests will fail");
        }
        if config.openai_api_key.is_none() {
            warn!("OPENAI_API_KEY not set, agents will not be able to talk");
        }
        if config.public_base_url().is_none() {
            warn!("BASE_URL not set, outbound calls and meeting webhooks are unavailable");
        }

        let twilio = TwilioClient::new(&config.twilio);
        let driver = ConversationDriver::new(realtime, DriverSettings::from_config(&config));

        info!(
            agent = %config.agent.display_name,
            model = %config.realtime.model,
            "Application state initialized"
        );

        Arc::new(Self {
            config,
            rooms,
            twilio,
            meeting,
            driver,
            sessions: SessionRegistry::new(),
        })
    }

    /// Collaborators handed to every new agent session.
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            transport: self.meeting.clone(),
            driver: self.driver.clone(),
            bridge_identity: self.config.agent.bridge_identity.clone(),
            driver_stop_timeout: DEFAULT_DRIVER_STOP_TIMEOUT,
        }
    }

    /// Cancel all agent sessions.
    pub async fn shutdown(&self, timeout: Duration) {
        self.sessions.shutdown(timeout).await;
    }
}

/// Public URL of the meeting webhook, carrying the shared token when set.
fn meeting_webhook_url(config: &ServerConfig) -> Option<String> {
    let base = config.public_base_url()?;
    let url = match config
        .videosdk
        .webhook_token
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        Some(token) => format!(
            "{base}{MEETING_WEBHOOK_PATH}?token={}",
            url::form_urlencoded::byte_serialize(token.as_bytes()).collect::<String>()
        ),
        None => format!("{base}{MEETING_WEBHOOK_PATH}"),
    };
    Some(url)
}
