//! Core configuration types and loading.

use super::validation::{validate_email_address, validate_header_text, validate_timezone};
use crate::delivery::OVERRIDE_SLOTS;
use crate::error::ConfigError;
use crate::template::DEFAULT_SUBJECT_PREFIX;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/formdispatch/config.yaml";

/// Default pause between two consecutive sends.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(1);

/// Main configuration structure for formdispatch.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// SMTP transport settings and credentials.
    pub smtp: SmtpConfig,
    /// Sender identity used in the `From` header.
    pub sender: SenderConfig,
    /// Template storage.
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Dispatch loop settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Shared delivery settings (primary recipient and override slots).
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// SMTP server configuration.
///
/// `username` and `password` support `${ENV_VAR}` substitution. They are
/// optional here: a batch without both is refused at dispatch time.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// TLS mode for SMTP connections.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    None,
    #[default]
    Starttls,
    Tls,
}

/// Sender identity.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Sender address, optionally with display name ("Forms <forms@example.com>").
    pub from: String,
}

/// Template storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding `<id>.html` templates, relative to the config file.
    #[serde(default = "default_templates_dir")]
    pub dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
        }
    }
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

/// Dispatch loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Pause between two consecutive sends (e.g., "1s", "500ms").
    #[serde(default = "default_send_delay", with = "humantime_serde")]
    pub delay: Duration,
    /// Prefix prepended to the submission subject.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Timezone for the rendered date and time (e.g., "UTC", "Europe/Paris").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            delay: default_send_delay(),
            subject_prefix: default_subject_prefix(),
            timezone: default_timezone(),
        }
    }
}

fn default_send_delay() -> Duration {
    DEFAULT_SEND_DELAY
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Shared delivery settings.
///
/// Outside a dispatch these are the recipients a mail client would target;
/// each dispatch send narrows them to its own destination.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryConfig {
    /// Primary recipient slot.
    #[serde(default)]
    pub to: Option<String>,
    /// Numbered override slots 1..=10, in order.
    #[serde(default)]
    pub overrides: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the whole configuration, collecting every error.
    ///
    /// Credentials are not checked here; see [`crate::Dispatcher`].
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.smtp.host.trim().is_empty() {
            errors.push(ConfigError::ValidationError(
                "smtp.host cannot be empty".to_string(),
            ));
        }

        if self.smtp.port == 0 {
            errors.push(ConfigError::ValidationError(
                "smtp.port must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = validate_email_address(&self.sender.from) {
            errors.push(ConfigError::ValidationError(format!("sender.from: {}", e)));
        }

        if let Err(e) = validate_header_text(&self.dispatch.subject_prefix) {
            errors.push(ConfigError::ValidationError(format!(
                "dispatch.subject_prefix: {}",
                e
            )));
        }

        if let Err(e) = validate_timezone(&self.dispatch.timezone) {
            errors.push(ConfigError::ValidationError(format!(
                "dispatch.timezone: {}",
                e
            )));
        }

        if let Some(to) = &self.delivery.to
            && let Err(e) = validate_email_address(to)
        {
            errors.push(ConfigError::ValidationError(format!("delivery.to: {}", e)));
        }

        if self.delivery.overrides.len() > OVERRIDE_SLOTS {
            errors.push(ConfigError::ValidationError(format!(
                "delivery.overrides: at most {} entries allowed, got {}",
                OVERRIDE_SLOTS,
                self.delivery.overrides.len()
            )));
        }

        for (i, address) in self.delivery.overrides.iter().enumerate() {
            if let Err(e) = validate_email_address(address) {
                errors.push(ConfigError::ValidationError(format!(
                    "delivery.overrides[{}]: {}",
                    i + 1,
                    e
                )));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
