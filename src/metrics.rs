//! Metric descriptions for formdispatch.
//!
//! Metrics are recorded through the `metrics` facade. Installing a recorder
//! (Prometheus exporter or other) is up to the embedding application; without
//! one every call is a no-op.

/// Register all metric descriptions.
///
/// Call once at startup, after the recorder is installed. Descriptions
/// provide the HELP text in exporters that support it.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        "formdispatch_batches_total",
        "Total number of submissions handed to the dispatcher"
    );
    describe_counter!(
        "formdispatch_batch_failures_total",
        "Total number of batches refused or aborted (missing credentials, render error, panic)"
    );
    describe_counter!(
        "formdispatch_emails_sent_total",
        "Total number of destinations that accepted the message"
    );
    describe_counter!(
        "formdispatch_emails_failed_total",
        "Total number of destinations whose send failed"
    );
    describe_counter!(
        "formdispatch_template_fallbacks_total",
        "Total number of submissions rendered with the built-in fallback template"
    );

    describe_histogram!(
        "formdispatch_batch_duration_seconds",
        "Time to deliver one submission to all of its destinations, including pauses"
    );
}
