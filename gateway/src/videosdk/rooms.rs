//! VideoSDK room REST client.
//!
//! - `POST {api}/v2/rooms` creates a room and returns its `roomId`
//! - `GET {api}/v2/rooms/validate/{roomId}` checks that a room exists
//! - `POST {api}/v2/rooms/deactivate` ends every session in a room
//!
//! The auth token is sent verbatim in the `Authorization` header. Calls are
//! never retried.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::VideoSdkConfig;

/// Meeting events the room webhook subscribes to.
pub const WEBHOOK_EVENTS: [&str; 4] = [
    "participant-joined",
    "participant-left",
    "session-started",
    "session-ended",
];

/// Identifier of a conferencing room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SIP address of the room on the given SIP domain.
    pub fn sip_uri(&self, domain: &str) -> String {
        format!("sip:{}@{}", self.0, domain)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room API failures.
#[derive(Debug, Error)]
pub enum RoomError {
    /// No credential configured; no request was made
    #[error("VideoSDK is not configured: {0}")]
    Configuration(String),

    /// Connection failure or timeout
    #[error("VideoSDK API unreachable: {0}")]
    Unreachable(String),

    /// Non-success status from the API
    #[error("VideoSDK API returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// Success status with an unusable body
    #[error("Unexpected VideoSDK response: {0}")]
    Protocol(String),
}

pub type RoomResult<T> = Result<T, RoomError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: Option<String>,
}

/// Client for the VideoSDK room endpoints.
#[derive(Clone)]
pub struct RoomProvisioner {
    client: reqwest::Client,
    api_url: String,
    auth_token: Option<String>,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for RoomProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomProvisioner")
            .field("api_url", &self.api_url)
            .field("configured", &self.auth_token.is_some())
            .field("webhook_url", &self.webhook_url.is_some())
            .finish()
    }
}

impl RoomProvisioner {
    /// Build a provisioner from config.
    ///
    /// `webhook_url`, when given, is registered on every created room so
    /// participant events are pushed back to this server.
    pub fn new(config: &VideoSdkConfig, webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth_token: config
                .auth_token
                .as_ref()
                .filter(|t| !t.trim().is_empty())
                .cloned(),
            webhook_url,
            timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.auth_token.is_some()
    }

    fn token(&self) -> RoomResult<&str> {
        self.auth_token.as_deref().ok_or_else(|| {
            RoomError::Configuration("VIDEOSDK_AUTH_TOKEN is not set".to_string())
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> RoomResult<reqwest::Response> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RoomError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "VideoSDK API returned an error");
            return Err(RoomError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Create a new room and return its id.
    pub async fn create_room(&self) -> RoomResult<RoomId> {
        let token = self.token()?;

        let body = match &self.webhook_url {
            Some(url) => json!({
                "webhook": {
                    "endPoint": url,
                    "events": WEBHOOK_EVENTS,
                }
            }),
            None => json!({}),
        };

        let request = self
            .client
            .post(format!("{}/v2/rooms", self.api_url))
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&body);
        let response = self.send(request).await?;

        let parsed: CreateRoomResponse = response
            .json()
            .await
            .map_err(|e| RoomError::Protocol(format!("invalid JSON body: {e}")))?;

        let room_id = parsed
            .room_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RoomError::Protocol("response has no roomId".to_string()))?;

        info!(room_id = %room_id, "Created VideoSDK room");
        Ok(RoomId::new(room_id))
    }

    /// Check that a room exists.
    pub async fn validate_room(&self, room_id: &RoomId) -> RoomResult<()> {
        let token = self.token()?;
        let request = self
            .client
            .get(format!("{}/v2/rooms/validate/{}", self.api_url, room_id))
            .header(reqwest::header::AUTHORIZATION, token);
        self.send(request).await?;
        debug!(room_id = %room_id, "VideoSDK room validated");
        Ok(())
    }

    /// End every active session in a room.
    pub async fn deactivate_room(&self, room_id: &RoomId) -> RoomResult<()> {
        let token = self.token()?;
        let request = self
            .client
            .post(format!("{}/v2/rooms/deactivate", self.api_url))
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&json!({ "roomId": room_id }));
        self.send(request).await?;
        info!(room_id = %room_id, "Deactivated VideoSDK room");
        Ok(())
    }
}
