//! Configuration loading and validation for formdispatch.
//!
//! This module handles loading the YAML configuration file, validation,
//! and resolving SMTP credentials from environment variables.

mod credentials;
mod env;
mod runtime;
mod secret;
mod types;
mod validation;

pub use credentials::TransportCredentials;
pub use env::resolve_env_vars;
pub use runtime::RuntimeConfig;
pub use secret::SecretString;
pub use types::{
    Config, DEFAULT_CONFIG_PATH, DEFAULT_SEND_DELAY, DeliveryConfig, DispatchConfig, SenderConfig,
    SmtpConfig, TemplatesConfig, TlsMode,
};
