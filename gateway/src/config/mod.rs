//! Configuration module for the call bridge gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//! - `utils`: Parsing helpers shared by the loaders
//!
//! # Example
//! ```rust,no_run
//! use callbridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default VideoSDK REST endpoint.
pub const DEFAULT_VIDEOSDK_API_URL: &str = "https://api.videosdk.live";
/// Default SIP domain of the VideoSDK SIP gateway.
pub const DEFAULT_SIP_DOMAIN: &str = "sip.videosdk.live";
/// Default Twilio REST endpoint.
pub const DEFAULT_TWILIO_API_URL: &str = "https://api.twilio.com";

/// VideoSDK conferencing settings.
#[derive(Debug, Clone)]
pub struct VideoSdkConfig {
    /// Token sent verbatim in the `Authorization` header of REST calls
    pub auth_token: Option<String>,
    /// REST API base URL (default: https://api.videosdk.live)
    pub api_url: String,
    /// SIP credentials used by the telephony provider to dial into a room
    pub sip_username: Option<String>,
    pub sip_password: Option<String>,
    /// SIP domain, rooms are reachable at `sip:<room>@<domain>`
    pub sip_domain: String,
    /// Shared token expected on incoming meeting webhooks (`?token=`)
    pub webhook_token: Option<String>,
    /// Upper bound for every REST call to VideoSDK
    /// Default: 10
    pub request_timeout_seconds: u64,
}

impl Default for VideoSdkConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            api_url: DEFAULT_VIDEOSDK_API_URL.to_string(),
            sip_username: None,
            sip_password: None,
            sip_domain: DEFAULT_SIP_DOMAIN.to_string(),
            webhook_token: None,
            request_timeout_seconds: 10,
        }
    }
}

/// Twilio telephony settings.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    /// Auth token, also the HMAC key for `X-Twilio-Signature`
    pub auth_token: Option<String>,
    /// Caller id used for outbound calls (E.164)
    pub from_number: Option<String>,
    /// REST API base URL (default: https://api.twilio.com)
    pub api_url: String,
    /// Reject webhook requests without a valid signature
    /// Default: true
    pub validate_signature: bool,
    /// Upper bound for call placement requests
    /// Default: 10
    pub request_timeout_seconds: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_url: DEFAULT_TWILIO_API_URL.to_string(),
            validate_signature: true,
            request_timeout_seconds: 10,
        }
    }
}

/// Realtime model settings applied to every conversation.
///
/// `model` and `voice` are passed to the provider as written.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub model: String,
    pub voice: Option<String>,
    /// Input transcription model
    pub transcription_model: String,
    /// Server VAD activation threshold (0.0 to 1.0)
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
    pub tool_choice: String,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            model: crate::core::realtime::DEFAULT_REALTIME_MODEL.to_string(),
            voice: None,
            transcription_model: "whisper-1".to_string(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 200,
            tool_choice: "auto".to_string(),
        }
    }
}

/// Agent persona and call flow settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display name the agent joins the room with
    pub display_name: String,
    /// Display name of the SIP participant that carries the phone caller.
    /// The conversation driver starts when this participant joins.
    pub bridge_identity: String,
    /// Fixed room for inbound calls; when unset a room is created per call
    pub room_id: Option<String>,
    /// Spoken to the caller before the SIP dial
    pub announcement: String,
    pub instructions: String,
    pub greeting: String,
    pub farewell: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            display_name: "AI Assistant".to_string(),
            bridge_identity: "SIP User".to_string(),
            room_id: None,
            announcement: "Thank you for calling. Connecting you to the meeting now.".to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            greeting: "Hello, how are you?".to_string(),
            farewell: "Goodbye!".to_string(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, public base URL)
/// - VideoSDK room and SIP settings
/// - Twilio credentials and webhook validation
/// - OpenAI Realtime settings and the agent persona
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Public URL the providers use to reach this server (e.g. `https://bridge.example.com`).
    /// Needed for webhook URLs and signature validation.
    pub base_url: Option<String>,

    pub videosdk: VideoSdkConfig,
    pub twilio: TwilioConfig,

    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    pub realtime: RealtimeSettings,
    pub agent: AgentConfig,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: "*"
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize every secret field when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.videosdk.auth_token {
            token.zeroize();
        }
        if let Some(ref mut password) = self.videosdk.sip_password {
            password.zeroize();
        }
        if let Some(ref mut token) = self.videosdk.webhook_token {
            token.zeroize();
        }
        if let Some(ref mut token) = self.twilio.auth_token {
            token.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public base URL without a trailing slash.
    pub fn public_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// OpenAI key for realtime sessions.
    pub fn get_openai_api_key(&self) -> Result<String, String> {
        self.openai_api_key
            .as_ref()
            .cloned()
            .ok_or_else(|| "OpenAI API key not configured in server environment".to_string())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        host: "localhost".to_string(),
        port: 8000,
        base_url: Some("https://bridge.example.com".to_string()),
        videosdk: VideoSdkConfig {
            auth_token: Some("vsdk-token".to_string()),
            sip_username: Some("sip-user".to_string()),
            sip_password: Some("sip-pass".to_string()),
            ..Default::default()
        },
        twilio: TwilioConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("twilio-secret".to_string()),
            from_number: Some("+15550001111".to_string()),
            ..Default::default()
        },
        openai_api_key: Some("sk-test".to_string()),
        realtime: RealtimeSettings::default(),
        agent: AgentConfig::default(),
        cors_allowed_origins: Some("*".to_string()),
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}
