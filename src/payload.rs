//! Submission payload accepted by the dispatch engine.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// One delivery target for a submission.
///
/// `label` only identifies the destination in logs and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub label: String,
    pub address: String,
}

impl Destination {
    pub fn new(label: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
        }
    }
}

/// A form submission to be delivered to every destination, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default = "default_template_id")]
    pub template_id: String,
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub destinations: Vec<Destination>,
}

fn default_template_id() -> String {
    "default".to_string()
}

impl SubmissionPayload {
    /// Copy out the fields a mail client is allowed to see.
    ///
    /// Destinations are deliberately left out: the client only ever
    /// learns the address of the send it is performing.
    pub fn minimized(&self) -> MinimizedPayload {
        MinimizedPayload {
            name: self.name.clone(),
            email: self.email.clone(),
            subject: self.subject.clone(),
            message: self.message.clone(),
            phone: self.phone.clone(),
            company: self.company.clone(),
            template_id: self.template_id.clone(),
            submission_id: self.submission_id.clone(),
            timestamp: self.timestamp,
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Submission fields handed to the mail client for a single send.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimizedPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub template_id: String,
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Human-readable date and time of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTimestamp {
    /// e.g. "January 15, 2026"
    pub date: String,
    /// e.g. "11:49:35 CET"
    pub time: String,
}

/// Split a timestamp into display date and time in the given timezone.
///
/// Subsecond precision is truncated. The timezone is validated at config
/// load, so parse failures here fall back to UTC with a warning.
pub fn split_timestamp(timestamp: &DateTime<Utc>, timezone: &str) -> SplitTimestamp {
    let tz: Tz = timezone.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = %timezone, "Invalid timezone, falling back to UTC");
        chrono_tz::UTC
    });

    let local = timestamp.with_timezone(&tz);
    SplitTimestamp {
        date: local.format("%B %-d, %Y").to_string(),
        time: local.format("%H:%M:%S %Z").to_string(),
    }
}
