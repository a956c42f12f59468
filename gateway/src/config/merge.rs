use super::ServerConfig;
use super::env::load_from_env;
use super::yaml::YamlConfig;

/// Overwrite `$target` when the YAML value is present.
macro_rules! apply {
    ($target:expr, $value:expr) => {
        if let Some(value) = $value {
            $target = value;
        }
    };
}

/// Overwrite an optional `$target` when the YAML value is present.
macro_rules! apply_opt {
    ($target:expr, $value:expr) => {
        if let Some(value) = $value {
            $target = Some(value);
        }
    };
}

/// Build the final configuration: environment first, YAML overrides on top.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, String> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        apply!(config.host, server.host);
        apply!(config.port, server.port);
        apply_opt!(config.base_url, server.base_url);
    }

    if let Some(videosdk) = yaml.videosdk {
        apply_opt!(config.videosdk.auth_token, videosdk.auth_token);
        apply!(config.videosdk.api_url, videosdk.api_url);
        apply_opt!(config.videosdk.sip_username, videosdk.sip_username);
        apply_opt!(config.videosdk.sip_password, videosdk.sip_password);
        apply!(config.videosdk.sip_domain, videosdk.sip_domain);
        apply_opt!(config.videosdk.webhook_token, videosdk.webhook_token);
        apply!(
            config.videosdk.request_timeout_seconds,
            videosdk.request_timeout_seconds
        );
    }

    if let Some(twilio) = yaml.twilio {
        apply_opt!(config.twilio.account_sid, twilio.account_sid);
        apply_opt!(config.twilio.auth_token, twilio.auth_token);
        apply_opt!(config.twilio.from_number, twilio.phone_number);
        apply!(config.twilio.api_url, twilio.api_url);
        apply!(config.twilio.validate_signature, twilio.validate_signature);
        apply!(
            config.twilio.request_timeout_seconds,
            twilio.request_timeout_seconds
        );
    }

    if let Some(openai) = yaml.openai {
        apply_opt!(config.openai_api_key, openai.api_key);
    }

    if let Some(realtime) = yaml.realtime {
        apply!(config.realtime.model, realtime.model);
        apply_opt!(config.realtime.voice, realtime.voice);
        apply!(
            config.realtime.transcription_model,
            realtime.transcription_model
        );
        apply!(config.realtime.vad_threshold, realtime.vad_threshold);
        apply!(
            config.realtime.vad_prefix_padding_ms,
            realtime.vad_prefix_padding_ms
        );
        apply!(
            config.realtime.vad_silence_duration_ms,
            realtime.vad_silence_duration_ms
        );
        apply!(config.realtime.tool_choice, realtime.tool_choice);
    }

    if let Some(agent) = yaml.agent {
        apply!(config.agent.display_name, agent.name);
        apply!(config.agent.bridge_identity, agent.bridge_identity);
        apply_opt!(config.agent.room_id, agent.room_id);
        apply!(config.agent.announcement, agent.announcement);
        apply!(config.agent.instructions, agent.instructions);
        apply!(config.agent.greeting, agent.greeting);
        apply!(config.agent.farewell, agent.farewell);
    }

    if let Some(security) = yaml.security {
        apply_opt!(config.cors_allowed_origins, security.cors_allowed_origins);
        apply!(
            config.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second
        );
        apply!(config.rate_limit_burst_size, security.rate_limit_burst_size);
    }

    Ok(config)
}
