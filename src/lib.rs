//! formdispatch - sequential, paced delivery of form submissions to
//! multiple email destinations.

pub mod cli;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod mail;
pub mod metrics;
pub mod pacing;
pub mod payload;
pub mod template;

// Re-export commonly used types
pub use cli::LogFormat;
pub use delivery::{DeliveryContext, DeliverySettings, OVERRIDE_SLOTS};
pub use dispatch::{
    BatchReport, DispatchCoordinator, DispatchOutcome, DispatchReport, DispatchState, Dispatcher,
    FailureReport, summarize,
};
pub use mail::{MailClient, MailRequest, SendResponse, SendResult, SmtpMailClient};
pub use metrics::register_metric_descriptions;
pub use pacing::{Pacer, TokioPacer};
pub use payload::{Destination, MinimizedPayload, SubmissionPayload};
pub use template::{
    FsTemplateStore, MessageRenderer, RenderedMessage, ResolvedTemplate, TemplateResolver,
    TemplateStore,
};
