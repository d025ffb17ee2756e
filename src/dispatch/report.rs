//! Per-destination outcomes and batch reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::payload::Destination;

/// Result of sending to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub success: bool,
    pub label: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DispatchOutcome {
    pub fn sent(destination: &Destination, message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            label: destination.label.clone(),
            address: destination.address.clone(),
            message_id: Some(message_id.into()),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(destination: &Destination, error: impl Into<String>) -> Self {
        Self {
            success: false,
            label: destination.label.clone(),
            address: destination.address.clone(),
            message_id: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Summary of a batch that ran to completion.
///
/// `success` only says the engine finished; individual failures are in
/// `outcomes` and `total_failed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub success: bool,
    pub outcomes: Vec<DispatchOutcome>,
    pub total_sent: usize,
    pub total_failed: usize,
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Batch refused or aborted before a full set of outcomes existed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureReport {
    pub fn new(batch_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            batch_id: batch_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// What the engine hands back for one submission.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchReport {
    Completed(DispatchReport),
    Failed(FailureReport),
}

impl BatchReport {
    /// True when the engine ran to completion, whatever the per-destination results.
    pub fn is_success(&self) -> bool {
        matches!(self, BatchReport::Completed(_))
    }

    pub fn batch_id(&self) -> &str {
        match self {
            BatchReport::Completed(report) => &report.batch_id,
            BatchReport::Failed(report) => &report.batch_id,
        }
    }

    pub fn as_completed(&self) -> Option<&DispatchReport> {
        match self {
            BatchReport::Completed(report) => Some(report),
            BatchReport::Failed(_) => None,
        }
    }

    pub fn as_failed(&self) -> Option<&FailureReport> {
        match self {
            BatchReport::Completed(_) => None,
            BatchReport::Failed(report) => Some(report),
        }
    }
}

/// Aggregate outcomes into a report, preserving their order.
pub fn summarize(batch_id: impl Into<String>, outcomes: Vec<DispatchOutcome>) -> DispatchReport {
    let total_sent = outcomes.iter().filter(|o| o.success).count();
    let total_failed = outcomes.len() - total_sent;

    DispatchReport {
        success: true,
        outcomes,
        total_sent,
        total_failed,
        batch_id: batch_id.into(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest(label: &str) -> Destination {
        Destination::new(label, format!("{}@example.com", label))
    }

    #[test]
    fn summarize_counts_and_keeps_order() {
        let outcomes = vec![
            DispatchOutcome::sent(&dest("a"), "m1"),
            DispatchOutcome::failed(&dest("b"), "rejected"),
            DispatchOutcome::sent(&dest("c"), "m3"),
        ];

        let report = summarize("batch-1", outcomes);

        assert!(report.success);
        assert_eq!(report.total_sent, 2);
        assert_eq!(report.total_failed, 1);
        let labels: Vec<_> = report.outcomes.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert_eq!(report.batch_id, "batch-1");
    }

    #[test]
    fn summarize_empty_batch() {
        let report = summarize("batch-empty", Vec::new());
        assert!(report.success);
        assert_eq!(report.total_sent, 0);
        assert_eq!(report.total_failed, 0);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn outcome_serializes_only_relevant_fields() {
        let sent = serde_json::to_value(DispatchOutcome::sent(&dest("a"), "m1")).unwrap();
        assert_eq!(sent["success"], true);
        assert_eq!(sent["label"], "a");
        assert_eq!(sent["address"], "a@example.com");
        assert_eq!(sent["messageId"], "m1");
        assert!(sent.get("error").is_none());
        assert!(sent["timestamp"].is_string());

        let failed = serde_json::to_value(DispatchOutcome::failed(&dest("b"), "boom")).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "boom");
        assert!(failed.get("messageId").is_none());
    }

    #[test]
    fn batch_report_serializes_untagged_camel_case() {
        let completed = BatchReport::Completed(summarize(
            "b1",
            vec![DispatchOutcome::sent(&dest("a"), "m1")],
        ));
        let json = serde_json::to_value(&completed).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["totalSent"], 1);
        assert_eq!(json["totalFailed"], 0);
        assert_eq!(json["batchId"], "b1");
        assert_eq!(json["outcomes"].as_array().unwrap().len(), 1);

        let failed = BatchReport::Failed(FailureReport::new("b2", "missing credential"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "missing credential");
        assert_eq!(json["batchId"], "b2");
        assert!(json.get("outcomes").is_none());
    }

    #[test]
    fn batch_report_accessors() {
        let failed = BatchReport::Failed(FailureReport::new("b2", "x"));
        assert!(!failed.is_success());
        assert_eq!(failed.batch_id(), "b2");
        assert!(failed.as_completed().is_none());
        assert!(failed.as_failed().is_some());

        let completed = BatchReport::Completed(summarize("b3", Vec::new()));
        assert!(completed.is_success());
        assert_eq!(completed.batch_id(), "b3");
    }
}
