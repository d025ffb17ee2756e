//! Mail client abstraction consumed by the dispatch engine.
//!
//! A [`MailClient`] performs exactly one send per call. The recipients of
//! that send come from the explicit [`DeliveryContext`] in the request,
//! never from ambient state.

pub mod smtp;

use async_trait::async_trait;
use serde::Serialize;

use crate::delivery::DeliveryContext;
use crate::error::MailError;
use crate::payload::MinimizedPayload;
use crate::template::RenderedMessage;

pub use smtp::{EmailTransport, SmtpMailClient, SmtpTransport};

/// Everything a mail client needs for a single send.
#[derive(Debug, Clone, Copy)]
pub struct MailRequest<'a> {
    pub submission: &'a MinimizedPayload,
    pub message: &'a RenderedMessage,
    pub delivery: &'a DeliveryContext,
}

/// Provider-assigned identifier of one sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub message_id: String,
}

/// Response of a mail client for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub results: Vec<SendResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            results: vec![SendResult {
                message_id: message_id.into(),
            }],
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Message id of the first result, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.results.first().map(|r| r.message_id.as_str())
    }
}

/// Sends one rendered message.
///
/// Implementations must be `Send + Sync` to work across async tasks.
/// They perform no retries; a failed send is reported once.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Short name of the client for logs (e.g., "smtp").
    fn name(&self) -> &str;

    /// Send `request.message` to the recipients in `request.delivery`.
    ///
    /// # Returns
    ///
    /// * `Ok(SendResponse)` - The provider answered; check `success`
    /// * `Err(MailError)` - The message could not be prepared or sent
    async fn send_email(&self, request: MailRequest<'_>) -> Result<SendResponse, MailError>;
}

impl std::fmt::Debug for dyn MailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailClient")
            .field("name", &self.name())
            .finish()
    }
}
