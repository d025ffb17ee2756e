//! Rendering of a submission into an HTML body and a plain-text body.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::resolver::ResolvedTemplate;
use crate::error::TemplateError;
use crate::payload::{SubmissionPayload, split_timestamp};

/// Subject prefix used when none is configured.
pub const DEFAULT_SUBJECT_PREFIX: &str = "New Form Submission: ";

/// Message rendered once per submission and reused for every destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Fields exposed to templates.
#[derive(Debug, Serialize)]
struct ViewModel<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
    phone: Option<&'a str>,
    company: Option<&'a str>,
    template_id: &'a str,
    submission_id: &'a str,
    timestamp: String,
    date: String,
    time: String,
    ip_address: Option<&'a str>,
    user_agent: Option<&'a str>,
}

impl<'a> ViewModel<'a> {
    fn new(payload: &'a SubmissionPayload, timezone: &str) -> Self {
        let split = split_timestamp(&payload.timestamp, timezone);
        Self {
            name: &payload.name,
            email: &payload.email,
            subject: &payload.subject,
            message: &payload.message,
            phone: payload.phone.as_deref(),
            company: payload.company.as_deref(),
            template_id: &payload.template_id,
            submission_id: &payload.submission_id,
            timestamp: payload.timestamp.to_rfc3339(),
            date: split.date,
            time: split.time,
            ip_address: payload.ip_address.as_deref(),
            user_agent: payload.user_agent.as_deref(),
        }
    }
}

/// Binds submissions into resolved templates.
///
/// Rendering performs no I/O and is deterministic for identical inputs.
#[derive(Debug, Clone)]
pub struct MessageRenderer {
    subject_prefix: String,
    timezone: String,
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT_PREFIX, "UTC")
    }
}

impl MessageRenderer {
    pub fn new(subject_prefix: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
            timezone: timezone.into(),
        }
    }

    /// Render `payload` with `template`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::RenderFailed`] if evaluating the template
    /// fails (e.g. an unknown filter).
    pub fn render(
        &self,
        template: &ResolvedTemplate,
        payload: &SubmissionPayload,
    ) -> Result<RenderedMessage, TemplateError> {
        let view = ViewModel::new(payload, &self.timezone);
        let html_body = template.template().render(&view)?;
        let text_body = html_to_text(&html_body);

        tracing::trace!(
            template_id = %template.template().id(),
            html_len = html_body.len(),
            text_len = text_body.len(),
            "Message rendered"
        );

        Ok(RenderedMessage {
            subject: format!("{}{}", self.subject_prefix, payload.subject),
            html_body,
            text_body,
        })
    }
}

/// Derive plain text from an HTML body.
///
/// Style and script blocks are removed with their content, remaining tags
/// are stripped, common entities are decoded, whitespace runs collapse to
/// a single space and the result is trimmed.
pub fn html_to_text(html: &str) -> String {
    static BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>|<script\b[^>]*>.*?</script\s*>")
            .expect("valid regex")
    });
    static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
    static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let without_blocks = BLOCKS.replace_all(html, "");
    let without_tags = TAGS.replace_all(&without_blocks, "");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&#x2f;", "/")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&")
}
