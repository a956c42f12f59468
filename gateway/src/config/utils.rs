use std::env;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset.
pub(super) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read and parse an environment variable, falling back to `default` when unset.
pub(super) fn env_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(default),
    }
}

/// Parse a boolean flag ("true"/"false", "1"/"0", "yes"/"no", "on"/"off").
pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid boolean for {name}: '{other}'")),
    }
}

pub(super) fn env_bool(name: &str, default: bool) -> Result<bool, String> {
    match env_string(name) {
        Some(raw) => parse_bool(name, &raw),
        None => Ok(default),
    }
}
