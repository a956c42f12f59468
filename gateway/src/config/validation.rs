use url::Url;

use super::ServerConfig;
use crate::utils::phone_validation::validate_phone_number;

/// Validate a loaded configuration.
///
/// Credentials are not required here; handlers report missing credentials
/// at request time so the server can start with a partial setup.
pub(super) fn validate(config: &ServerConfig) -> Result<(), String> {
    if config.port == 0 {
        return Err("port must be greater than 0".to_string());
    }

    if let Some(base_url) = config.public_base_url() {
        validate_http_url("base_url", base_url)?;
    }
    validate_http_url("videosdk.api_url", &config.videosdk.api_url)?;
    validate_http_url("twilio.api_url", &config.twilio.api_url)?;

    if config.videosdk.sip_domain.trim().is_empty() {
        return Err("videosdk.sip_domain must not be empty".to_string());
    }
    if config.videosdk.request_timeout_seconds == 0 {
        return Err("videosdk.request_timeout_seconds must be greater than 0".to_string());
    }
    if config.twilio.request_timeout_seconds == 0 {
        return Err("twilio.request_timeout_seconds must be greater than 0".to_string());
    }

    if let Some(ref from) = config.twilio.from_number {
        validate_phone_number(from)
            .map_err(|e| format!("twilio.phone_number is not a valid number: {e}"))?;
    }

    if config.realtime.model.trim().is_empty() {
        return Err("realtime.model must not be empty".to_string());
    }
    if config
        .realtime
        .voice
        .as_deref()
        .is_some_and(|v| v.trim().is_empty())
    {
        return Err("realtime.voice must not be empty when set".to_string());
    }

    let threshold = config.realtime.vad_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!(
            "realtime.vad_threshold must be between 0.0 and 1.0, got {threshold}"
        ));
    }

    if config.agent.bridge_identity.trim().is_empty() {
        return Err("agent.bridge_identity must not be empty".to_string());
    }
    if config.agent.display_name.trim().is_empty() {
        return Err("agent.name must not be empty".to_string());
    }

    if config.rate_limit_requests_per_second == 0 {
        return Err("rate_limit_requests_per_second must be greater than 0".to_string());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("rate_limit_burst_size must be greater than 0".to_string());
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{field} is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{field} must use http or https, got '{other}'")),
    }
}
