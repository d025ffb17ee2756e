//! Inter-send pacing.
//!
//! The dispatch loop waits between two consecutive sends so the mail
//! provider is never hit in a burst. The wait sits behind [`Pacer`] so tests
//! can record pauses instead of sleeping.

use async_trait::async_trait;
use std::time::Duration;

pub use crate::config::DEFAULT_SEND_DELAY;

/// Waits between two sends.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

/// Pacer backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
