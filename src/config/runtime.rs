//! Runtime configuration with resolved paths and credentials.

use super::credentials::TransportCredentials;
use super::types::{Config, DeliveryConfig, DispatchConfig, SmtpConfig};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Configuration ready to wire the dispatcher.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub smtp: SmtpConfig,
    pub from: String,
    /// Template directory, absolute or relative to the working directory.
    pub templates_dir: PathBuf,
    pub dispatch: DispatchConfig,
    pub delivery: DeliveryConfig,
    pub credentials: TransportCredentials,
}

impl Config {
    /// Compile configuration into its runtime form.
    ///
    /// A relative `templates.dir` is resolved against the directory of the
    /// configuration file.
    pub fn compile(self, config_path: &Path) -> Result<RuntimeConfig, ConfigError> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));

        let templates_dir = if self.templates.dir.is_absolute() {
            self.templates.dir
        } else {
            config_dir.join(&self.templates.dir)
        };

        let credentials = TransportCredentials::resolve(&self.smtp);
        if !credentials.is_complete() {
            tracing::warn!("SMTP credentials incomplete, every batch will be refused");
        }

        Ok(RuntimeConfig {
            smtp: self.smtp,
            from: self.sender.from,
            templates_dir,
            dispatch: self.dispatch,
            delivery: self.delivery,
            credentials,
        })
    }
}
