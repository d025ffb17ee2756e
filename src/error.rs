//! Centralized error types for formdispatch using thiserror.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("missing required transport credential: {0}")]
    MissingCredential(&'static str),
    #[error("invalid smtp transport: {0}")]
    InvalidTransport(String),
}

/// Errors related to template storage and rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template '{id}' not found")]
    NotFound { id: String },
    #[error("cannot read template '{id}': {message}")]
    Unreadable { id: String, message: String },
    #[error("template '{id}' failed to compile: {message}")]
    CompileFailed { id: String, message: String },
    #[error("template render failed: {message}")]
    RenderFailed { message: String },
}

/// Errors raised by a mail client while preparing or sending one message.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },
    #[error("no recipient in delivery context")]
    NoRecipient,
    #[error("failed to build email: {0}")]
    BuildFailed(String),
}

/// Errors related to the shared delivery settings.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("a scoped destination is already active")]
    ScopeActive,
    #[error("override slot {0} out of range (1..={max})", max = crate::delivery::OVERRIDE_SLOTS)]
    SlotOutOfRange(usize),
}

/// Errors that abort a whole dispatch batch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("dispatch panicked: {0}")]
    Panic(String),
}
