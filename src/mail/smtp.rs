//! SMTP mail client built on lettre.
//!
//! # Testability
//!
//! The client sends through the [`EmailTransport`] trait:
//! - Production: [`SmtpTransport`] wrapping `AsyncSmtpTransport<Tokio1Executor>`
//! - Testing: a mock transport recording messages, no SMTP server needed

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use super::{MailClient, MailRequest, SendResponse};
use crate::config::{SmtpConfig, TlsMode, TransportCredentials};
use crate::error::{ConfigError, MailError};

// =============================================================================
// EmailTransport Trait
// =============================================================================

/// Async email transport abstraction.
///
/// Allows injecting mock transports in tests while using the real
/// `AsyncSmtpTransport` in production.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send an email message.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Email accepted by the server
    /// * `Err(String)` - Error message describing the failure
    async fn send_email(&self, message: Message) -> Result<(), String>;
}

/// Real SMTP transport wrapper implementing `EmailTransport`.
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { inner: transport }
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send_email(&self, message: Message) -> Result<(), String> {
        self.inner
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

// =============================================================================
// SmtpMailClient
// =============================================================================

/// Mail client sending one `multipart/alternative` message per call.
///
/// - `From` is the configured sender
/// - `Reply-To` is the submitter, when their address parses
/// - `To` is every recipient of the request's delivery context
/// - `Message-ID` is generated per send and returned as the message id
pub struct SmtpMailClient {
    transport: Arc<dyn EmailTransport>,
    from: Mailbox,
}

impl SmtpMailClient {
    /// Build a client from SMTP settings and the sender address.
    ///
    /// Credentials are attached only when both values are present;
    /// whether they are required is decided by the dispatcher.
    pub fn from_config(
        smtp: &SmtpConfig,
        from: &str,
        credentials: &TransportCredentials,
    ) -> Result<Self, ConfigError> {
        let from: Mailbox = from.parse().map_err(|e| {
            ConfigError::ValidationError(format!("invalid sender address '{}': {}", from, e))
        })?;

        let transport = Self::build_transport(smtp, credentials)?;

        tracing::info!(
            host = %smtp.host,
            port = smtp.port,
            tls = ?smtp.tls,
            from = %from,
            "SMTP mail client configured"
        );

        Ok(Self::with_transport(Arc::new(SmtpTransport::new(transport)), from))
    }

    /// Create a client with a custom transport.
    pub fn with_transport(transport: Arc<dyn EmailTransport>, from: Mailbox) -> Self {
        Self { transport, from }
    }

    /// Build SMTP transport based on TLS mode, credentials, and tls_verify setting.
    fn build_transport(
        smtp: &SmtpConfig,
        credentials: &TransportCredentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, ConfigError> {
        let host = smtp.host.as_str();

        let tls_parameters = || {
            let mut tls_builder = TlsParameters::builder(host.to_string());
            if !smtp.tls_verify {
                tls_builder = tls_builder.dangerous_accept_invalid_certs(true);
            }
            tls_builder
                .build()
                .map_err(|e| ConfigError::InvalidTransport(format!("TLS configuration error: {}", e)))
        };

        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(smtp.port);
        let builder = match smtp.tls {
            TlsMode::None => builder,
            TlsMode::Starttls => builder.tls(Tls::Required(tls_parameters()?)),
            TlsMode::Tls => builder.tls(Tls::Wrapper(tls_parameters()?)),
        };

        let builder = match (&credentials.username, &credentials.password) {
            (Some(u), Some(p)) => {
                builder.credentials(Credentials::new(u.expose().to_string(), p.expose().to_string()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }

    /// Build the message for one request, returning it with its Message-ID.
    fn build_message(&self, request: &MailRequest<'_>) -> Result<(Message, String), MailError> {
        let recipients = request
            .delivery
            .recipients()
            .map(|addr| {
                addr.parse::<Mailbox>().map_err(|e| MailError::InvalidAddress {
                    address: addr.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if recipients.is_empty() {
            return Err(MailError::NoRecipient);
        }

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain());

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(request.message.subject.as_str())
            .message_id(Some(message_id.clone()));

        for recipient in recipients {
            builder = builder.to(recipient);
        }

        let submission = request.submission;
        match submission.email.parse::<Address>() {
            Ok(address) => {
                builder = builder.reply_to(Mailbox::new(Some(submission.name.clone()), address));
            }
            Err(e) => {
                tracing::debug!(
                    submission_id = %submission.submission_id,
                    error = %e,
                    "Submitter email does not parse, sending without Reply-To"
                );
            }
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                request.message.text_body.clone(),
                request.message.html_body.clone(),
            ))
            .map_err(|e| MailError::BuildFailed(e.to_string()))?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl MailClient for SmtpMailClient {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_email(&self, request: MailRequest<'_>) -> Result<SendResponse, MailError> {
        let (message, message_id) = self.build_message(&request)?;

        match self.transport.send_email(message).await {
            Ok(()) => {
                tracing::debug!(
                    message_id = %message_id,
                    submission_id = %request.submission.submission_id,
                    "Email accepted by SMTP server"
                );
                Ok(SendResponse::sent(message_id))
            }
            Err(error) => {
                tracing::warn!(
                    submission_id = %request.submission.submission_id,
                    error = %error,
                    "SMTP send failed"
                );
                Ok(SendResponse::failed(error))
            }
        }
    }
}

impl std::fmt::Debug for SmtpMailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose credentials in debug output
        f.debug_struct("SmtpMailClient")
            .field("from", &self.from.to_string())
            .finish()
    }
}
