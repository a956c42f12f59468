//! Phone number validation for outbound dialing
//!
//! Numbers are accepted in E.164 form (`+` followed by 8 to 15 digits, no
//! leading zero in the country code). Common separators are stripped first.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static E164_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("E.164 pattern compiles"));

/// Errors that can occur during phone number validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneValidationError {
    #[error("phone number is empty")]
    Empty,

    #[error("phone number must start with '+' and a country code: {0}")]
    MissingCountryCode(String),

    #[error("phone number is not valid E.164: {0}")]
    InvalidFormat(String),
}

/// Normalize and validate a phone number.
///
/// Spaces, dashes, dots and parentheses are removed before the E.164 check.
/// Returns the normalized number on success.
pub fn validate_phone_number(raw: &str) -> Result<String, PhoneValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PhoneValidationError::Empty);
    }

    let normalized: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if !normalized.starts_with('+') {
        return Err(PhoneValidationError::MissingCountryCode(trimmed.to_string()));
    }

    if !E164_PATTERN.is_match(&normalized) {
        return Err(PhoneValidationError::InvalidFormat(trimmed.to_string()));
    }

    Ok(normalized)
}
