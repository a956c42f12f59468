use super::utils::{env_bool, env_parse, env_string};
use super::{
    AgentConfig, DEFAULT_SIP_DOMAIN, DEFAULT_TWILIO_API_URL, DEFAULT_VIDEOSDK_API_URL,
    RealtimeSettings, ServerConfig, TwilioConfig, VideoSdkConfig, validation,
};

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults. Credentials stay `None` when unset
    /// and are reported when a request first needs them.
    ///
    /// # Errors
    /// Returns an error when a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }
}

/// Build a configuration from the environment without validating it.
pub(super) fn load_from_env() -> Result<ServerConfig, String> {
    let realtime_defaults = RealtimeSettings::default();
    let agent_defaults = AgentConfig::default();

    Ok(ServerConfig {
        host: env_string("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_parse("PORT", 8000u16)?,
        base_url: env_string("BASE_URL"),

        videosdk: VideoSdkConfig {
            auth_token: env_string("VIDEOSDK_AUTH_TOKEN"),
            api_url: env_string("VIDEOSDK_API_URL")
                .unwrap_or_else(|| DEFAULT_VIDEOSDK_API_URL.to_string()),
            sip_username: env_string("VIDEOSDK_SIP_USERNAME"),
            sip_password: env_string("VIDEOSDK_SIP_PASSWORD"),
            sip_domain: env_string("VIDEOSDK_SIP_DOMAIN")
                .unwrap_or_else(|| DEFAULT_SIP_DOMAIN.to_string()),
            webhook_token: env_string("VIDEOSDK_WEBHOOK_TOKEN"),
            request_timeout_seconds: env_parse("ROOM_REQUEST_TIMEOUT_SECONDS", 10u64)?,
        },

        twilio: TwilioConfig {
            account_sid: env_string("TWILIO_ACCOUNT_SID"),
            auth_token: env_string("TWILIO_AUTH_TOKEN"),
            from_number: env_string("TWILIO_PHONE_NUMBER"),
            api_url: env_string("TWILIO_API_URL")
                .unwrap_or_else(|| DEFAULT_TWILIO_API_URL.to_string()),
            validate_signature: env_bool("TWILIO_VALIDATE_SIGNATURE", true)?,
            request_timeout_seconds: env_parse("TWILIO_REQUEST_TIMEOUT_SECONDS", 10u64)?,
        },

        openai_api_key: env_string("OPENAI_API_KEY"),
        realtime: RealtimeSettings {
            model: env_string("OPENAI_REALTIME_MODEL").unwrap_or(realtime_defaults.model),
            voice: env_string("OPENAI_REALTIME_VOICE"),
            transcription_model: env_string("OPENAI_TRANSCRIPTION_MODEL")
                .unwrap_or(realtime_defaults.transcription_model),
            vad_threshold: env_parse("VAD_THRESHOLD", realtime_defaults.vad_threshold)?,
            vad_prefix_padding_ms: env_parse(
                "VAD_PREFIX_PADDING_MS",
                realtime_defaults.vad_prefix_padding_ms,
            )?,
            vad_silence_duration_ms: env_parse(
                "VAD_SILENCE_DURATION_MS",
                realtime_defaults.vad_silence_duration_ms,
            )?,
            tool_choice: env_string("OPENAI_TOOL_CHOICE").unwrap_or(realtime_defaults.tool_choice),
        },
        agent: AgentConfig {
            display_name: env_string("AGENT_NAME").unwrap_or(agent_defaults.display_name),
            bridge_identity: env_string("AGENT_BRIDGE_IDENTITY")
                .unwrap_or(agent_defaults.bridge_identity),
            room_id: env_string("AGENT_ROOM_ID"),
            announcement: env_string("CALL_ANNOUNCEMENT").unwrap_or(agent_defaults.announcement),
            instructions: env_string("AGENT_INSTRUCTIONS").unwrap_or(agent_defaults.instructions),
            greeting: env_string("AGENT_GREETING").unwrap_or(agent_defaults.greeting),
            farewell: env_string("AGENT_FAREWELL").unwrap_or(agent_defaults.farewell),
        },

        cors_allowed_origins: Some(
            env_string("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
        ),
        rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND", 60u32)?,
        rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE", 10u32)?,
    })
}
