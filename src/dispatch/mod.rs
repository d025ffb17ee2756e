//! Top-level dispatch engine.
//!
//! [`Dispatcher::send_to_destinations`] turns one submission into a
//! [`BatchReport`]: credentials are checked, the template is resolved and
//! rendered once, then every destination gets its own paced, isolated send.
//! Nothing escapes as a panic; the caller always gets a structured report.

mod coordinator;
mod report;

pub use coordinator::{DispatchCoordinator, DispatchState, UNKNOWN_SEND_ERROR};
pub use report::{BatchReport, DispatchOutcome, DispatchReport, FailureReport, summarize};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{DEFAULT_SEND_DELAY, RuntimeConfig, TransportCredentials};
use crate::delivery::DeliverySettings;
use crate::error::DispatchError;
use crate::mail::MailClient;
use crate::pacing::{Pacer, TokioPacer};
use crate::payload::SubmissionPayload;
use crate::template::{MessageRenderer, TemplateResolver, TemplateStore};
use coordinator::panic_message;

/// Delivers submissions to their destinations.
pub struct Dispatcher {
    credentials: TransportCredentials,
    resolver: TemplateResolver,
    renderer: MessageRenderer,
    client: Arc<dyn MailClient>,
    settings: DeliverySettings,
    pacer: Arc<dyn Pacer>,
    delay: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with default rendering, empty delivery settings
    /// and a one second tokio-timed delay between sends.
    pub fn new(
        client: Arc<dyn MailClient>,
        store: Arc<dyn TemplateStore>,
        credentials: TransportCredentials,
    ) -> Self {
        Self {
            credentials,
            resolver: TemplateResolver::new(store),
            renderer: MessageRenderer::default(),
            client,
            settings: DeliverySettings::default(),
            pacer: Arc::new(TokioPacer),
            delay: DEFAULT_SEND_DELAY,
        }
    }

    /// Wire a dispatcher from compiled configuration.
    pub fn from_runtime(
        runtime: &RuntimeConfig,
        client: Arc<dyn MailClient>,
        store: Arc<dyn TemplateStore>,
    ) -> Self {
        Self::new(client, store, runtime.credentials.clone())
            .with_renderer(MessageRenderer::new(
                runtime.dispatch.subject_prefix.clone(),
                runtime.dispatch.timezone.clone(),
            ))
            .with_settings(DeliverySettings::new(
                runtime.delivery.to.clone(),
                runtime.delivery.overrides.clone(),
            ))
            .with_delay(runtime.dispatch.delay)
    }

    pub fn with_renderer(mut self, renderer: MessageRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_settings(mut self, settings: DeliverySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared delivery settings handle used by this dispatcher.
    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Deliver `payload` to each of its destinations, in order.
    ///
    /// Returns [`BatchReport::Failed`] without any send when credentials are
    /// missing, and when rendering fails or the batch panics. Otherwise
    /// returns [`BatchReport::Completed`] with one outcome per destination.
    pub async fn send_to_destinations(&self, payload: &SubmissionPayload) -> BatchReport {
        let batch_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "dispatch_batch",
            batch_id = %batch_id,
            submission_id = %payload.submission_id,
            destinations = payload.destinations.len()
        );
        let start = Instant::now();
        metrics::counter!("formdispatch_batches_total").increment(1);

        let result = AssertUnwindSafe(self.run_batch(&batch_id, payload))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| Err(DispatchError::Panic(panic_message(panic.as_ref()))));

        let report = match result {
            Ok(report) => {
                span.in_scope(|| {
                    tracing::info!(
                        total_sent = report.total_sent,
                        total_failed = report.total_failed,
                        "Batch completed"
                    );
                });
                BatchReport::Completed(report)
            }
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "Batch failed"));
                metrics::counter!("formdispatch_batch_failures_total").increment(1);
                BatchReport::Failed(FailureReport::new(batch_id, e.to_string()))
            }
        };

        metrics::histogram!("formdispatch_batch_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        report
    }

    async fn run_batch(
        &self,
        batch_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<DispatchReport, DispatchError> {
        self.credentials.require()?;

        let resolved = self.resolver.resolve_blocking(&payload.template_id).await;
        let message = self.renderer.render(&resolved, payload)?;
        tracing::debug!(
            template = %resolved.template().id(),
            fallback = resolved.is_fallback(),
            "Message rendered"
        );

        let coordinator = DispatchCoordinator::new(
            Arc::clone(&self.client),
            self.settings.clone(),
            Arc::clone(&self.pacer),
            self.delay,
        );
        let outcomes = coordinator
            .dispatch_all(&message, &payload.destinations, &payload.minimized())
            .await;

        Ok(summarize(batch_id, outcomes))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("client", &self.client.name())
            .field("credentials", &self.credentials)
            .field("delay", &self.delay)
            .finish()
    }
}
