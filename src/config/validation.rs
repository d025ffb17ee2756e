//! Field validation utilities.

use lettre::message::Mailbox;

/// Validates an email address, with or without display name.
pub(crate) fn validate_email_address(address: &str) -> Result<(), String> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| format!("invalid email address '{}': {}", address, e))
}

/// Validates an IANA timezone name.
pub(crate) fn validate_timezone(timezone: &str) -> Result<(), String> {
    timezone
        .parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| format!("'{}' is not a valid timezone", timezone))
}

/// Validates text destined for a mail header.
///
/// Line breaks would allow header injection.
pub(crate) fn validate_header_text(text: &str) -> Result<(), String> {
    if text.contains(['\r', '\n']) {
        Err("must not contain line breaks".to_string())
    } else {
        Ok(())
    }
}
