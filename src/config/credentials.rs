//! Transport credentials resolved from configuration.

use super::env::resolve_env_vars;
use super::secret::SecretString;
use super::types::SmtpConfig;
use crate::error::ConfigError;

/// SMTP username and password, after `${ENV}` substitution.
///
/// A missing, blank, or unresolvable value is stored as `None`. Loading never
/// fails on credentials: [`TransportCredentials::require`] is checked at the
/// start of every batch instead, so a misconfigured deployment reports a
/// failure per submission rather than refusing to start.
#[derive(Debug, Clone, Default)]
pub struct TransportCredentials {
    pub username: Option<SecretString>,
    pub password: Option<SecretString>,
}

impl TransportCredentials {
    pub fn new(username: Option<SecretString>, password: Option<SecretString>) -> Self {
        Self {
            username: username.filter(|s| !s.is_blank()),
            password: password.filter(|s| !s.is_blank()),
        }
    }

    /// Resolve credentials from the SMTP section.
    pub fn resolve(smtp: &SmtpConfig) -> Self {
        Self::new(
            resolve_field("username", smtp.username.as_deref()),
            resolve_field("password", smtp.password.as_deref()),
        )
    }

    /// Both values must be present for a batch to start.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingCredential`] naming the first missing value.
    pub fn require(&self) -> Result<(&SecretString, &SecretString), ConfigError> {
        let username = self
            .username
            .as_ref()
            .ok_or(ConfigError::MissingCredential("username"))?;
        let password = self
            .password
            .as_ref()
            .ok_or(ConfigError::MissingCredential("password"))?;
        Ok((username, password))
    }

    pub fn is_complete(&self) -> bool {
        self.require().is_ok()
    }
}

fn resolve_field(field: &'static str, raw: Option<&str>) -> Option<SecretString> {
    let raw = raw?;
    match resolve_env_vars(raw) {
        Ok(value) => Some(SecretString::new(value)),
        Err(e) => {
            tracing::warn!(field = field, error = %e, "SMTP credential could not be resolved");
            None
        }
    }
}
