//! Secret string wrapper for transport credentials.

use serde::Deserialize;

/// Wrapper for credentials that never appear in logs.
///
/// `Debug` and `Display` always print `[REDACTED]`; the value is only
/// reachable through [`SecretString::expose`].
///
/// # Example
///
/// ```
/// use formdispatch::config::SecretString;
///
/// let password = SecretString::new("hunter2".to_string());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose(), "hunter2");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// Exposes the underlying value. Never pass the result to a logger.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the value is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString(s.to_string())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}
