use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   base_url: "https://bridge.example.com"
///
/// videosdk:
///   auth_token: "your-videosdk-token"
///   api_url: "https://api.videosdk.live"
///   sip_username: "sip-user"
///   sip_password: "sip-password"
///   sip_domain: "sip.videosdk.live"
///   webhook_token: "shared-webhook-token"
///   request_timeout_seconds: 10
///
/// twilio:
///   account_sid: "ACxxxxxxxx"
///   auth_token: "your-twilio-token"
///   phone_number: "+15550001111"
///   validate_signature: true
///
/// openai:
///   api_key: "sk-..."
///
/// realtime:
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   transcription_model: "whisper-1"
///   vad_threshold: 0.5
///   vad_prefix_padding_ms: 300
///   vad_silence_duration_ms: 200
///
/// agent:
///   name: "AI Assistant"
///   bridge_identity: "SIP User"
///   room_id: "abcd-efgh-ijkl"
///   greeting: "Hello, how are you?"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub videosdk: Option<VideoSdkYaml>,
    pub twilio: Option<TwilioYaml>,
    pub openai: Option<OpenAiYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub agent: Option<AgentYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
}

/// VideoSDK configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VideoSdkYaml {
    pub auth_token: Option<String>,
    pub api_url: Option<String>,
    pub sip_username: Option<String>,
    pub sip_password: Option<String>,
    pub sip_domain: Option<String>,
    pub webhook_token: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

/// Twilio configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TwilioYaml {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub phone_number: Option<String>,
    pub api_url: Option<String>,
    pub validate_signature: Option<bool>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiYaml {
    pub api_key: Option<String>,
}

/// Realtime model settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub model: Option<String>,
    pub voice: Option<String>,
    pub transcription_model: Option<String>,
    pub vad_threshold: Option<f32>,
    pub vad_prefix_padding_ms: Option<u32>,
    pub vad_silence_duration_ms: Option<u32>,
    pub tool_choice: Option<String>,
}

/// Agent settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AgentYaml {
    pub name: Option<String>,
    pub bridge_identity: Option<String>,
    pub room_id: Option<String>,
    pub announcement: Option<String>,
    pub instructions: Option<String>,
    pub greeting: Option<String>,
    pub farewell: Option<String>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
