//! Sequential, paced delivery of one rendered message to many destinations.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use super::report::DispatchOutcome;
use crate::delivery::DeliverySettings;
use crate::mail::{MailClient, MailRequest};
use crate::pacing::Pacer;
use crate::payload::{Destination, MinimizedPayload};
use crate::template::RenderedMessage;

/// Error recorded when a client reports failure without a reason.
pub const UNKNOWN_SEND_ERROR: &str = "Unknown error sending email";

/// Position of the dispatch loop.
///
/// `Idle -> Sending(0) -> Delaying(0) -> Sending(1) -> ... -> Sending(n-1) -> Done`.
/// A delay is only ever entered between two sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending(usize),
    Delaying(usize),
    Done,
}

impl DispatchState {
    /// Next state for a batch of `total` destinations.
    pub fn advance(self, total: usize) -> Self {
        match self {
            DispatchState::Idle if total == 0 => DispatchState::Done,
            DispatchState::Idle => DispatchState::Sending(0),
            DispatchState::Sending(i) if i + 1 < total => DispatchState::Delaying(i),
            DispatchState::Sending(_) => DispatchState::Done,
            DispatchState::Delaying(i) => DispatchState::Sending(i + 1),
            DispatchState::Done => DispatchState::Done,
        }
    }
}

/// Walks the destination list, one isolated send at a time.
pub struct DispatchCoordinator {
    client: Arc<dyn MailClient>,
    settings: DeliverySettings,
    pacer: Arc<dyn Pacer>,
    delay: Duration,
}

impl DispatchCoordinator {
    pub fn new(
        client: Arc<dyn MailClient>,
        settings: DeliverySettings,
        pacer: Arc<dyn Pacer>,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            settings,
            pacer,
            delay,
        }
    }

    /// Send `message` to every destination in order.
    ///
    /// Always returns one outcome per destination, in input order. A failed
    /// send never stops the destinations after it.
    pub async fn dispatch_all(
        &self,
        message: &RenderedMessage,
        destinations: &[Destination],
        submission: &MinimizedPayload,
    ) -> Vec<DispatchOutcome> {
        let total = destinations.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut state = DispatchState::Idle;

        loop {
            state = state.advance(total);
            match state {
                DispatchState::Sending(i) => {
                    let outcome = self.send_one(&destinations[i], message, submission).await;
                    outcomes.push(outcome);
                }
                DispatchState::Delaying(i) => {
                    tracing::debug!(
                        after = i + 1,
                        delay = ?self.delay,
                        "Pausing before next send"
                    );
                    self.pacer.pause(self.delay).await;
                }
                DispatchState::Idle | DispatchState::Done => break,
            }
        }

        outcomes
    }

    async fn send_one(
        &self,
        destination: &Destination,
        message: &RenderedMessage,
        submission: &MinimizedPayload,
    ) -> DispatchOutcome {
        let client = &self.client;
        let scoped = self
            .settings
            .with_scoped_destination(&destination.address, move |delivery| async move {
                let request = MailRequest {
                    submission,
                    message,
                    delivery: &delivery,
                };
                AssertUnwindSafe(client.send_email(request))
                    .catch_unwind()
                    .await
            })
            .await;

        let outcome = match scoped {
            Ok(Ok(Ok(response))) if response.success => {
                DispatchOutcome::sent(destination, response.message_id().unwrap_or_default())
            }
            Ok(Ok(Ok(response))) => DispatchOutcome::failed(
                destination,
                response
                    .error
                    .unwrap_or_else(|| UNKNOWN_SEND_ERROR.to_string()),
            ),
            Ok(Ok(Err(e))) => DispatchOutcome::failed(destination, e.to_string()),
            Ok(Err(panic)) => DispatchOutcome::failed(destination, panic_message(panic.as_ref())),
            Err(e) => DispatchOutcome::failed(destination, e.to_string()),
        };

        if outcome.success {
            tracing::info!(
                destination = %destination.label,
                client = %self.client.name(),
                message_id = outcome.message_id.as_deref().unwrap_or_default(),
                "Email sent"
            );
            metrics::counter!("formdispatch_emails_sent_total").increment(1);
        } else {
            tracing::error!(
                destination = %destination.label,
                client = %self.client.name(),
                error = outcome.error.as_deref().unwrap_or_default(),
                "Email send failed"
            );
            metrics::counter!("formdispatch_emails_failed_total").increment(1);
        }

        outcome
    }
}

impl std::fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("client", &self.client.name())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_for_three_destinations() {
        let mut state = DispatchState::Idle;
        let mut trace = Vec::new();
        loop {
            state = state.advance(3);
            trace.push(state);
            if state == DispatchState::Done {
                break;
            }
        }

        assert_eq!(
            trace,
            vec![
                DispatchState::Sending(0),
                DispatchState::Delaying(0),
                DispatchState::Sending(1),
                DispatchState::Delaying(1),
                DispatchState::Sending(2),
                DispatchState::Done,
            ]
        );
    }

    #[test]
    fn state_machine_single_destination_never_delays() {
        let first = DispatchState::Idle.advance(1);
        assert_eq!(first, DispatchState::Sending(0));
        assert_eq!(first.advance(1), DispatchState::Done);
    }

    #[test]
    fn state_machine_empty_batch_is_done_immediately() {
        assert_eq!(DispatchState::Idle.advance(0), DispatchState::Done);
        assert_eq!(DispatchState::Done.advance(0), DispatchState::Done);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(boxed.as_ref()), "panic with non-string payload");
    }
}
