//! Message templating for form submissions.
//!
//! Templates are Jinja2-style HTML documents (minijinja) stored one per
//! file. Resolution never fails: an unknown, unreadable or invalid
//! template resolves to the built-in fallback, which renders every field
//! a custom template can use.
//!
//! ```text
//! TemplateStore -> TemplateResolver -> ResolvedTemplate -> MessageRenderer -> RenderedMessage
//! ```

mod render;
mod resolver;
mod store;

pub use render::{DEFAULT_SUBJECT_PREFIX, MessageRenderer, RenderedMessage, html_to_text};
pub use resolver::{CompiledTemplate, FALLBACK_TEMPLATE_ID, ResolvedTemplate, TemplateResolver};
pub use store::{FsTemplateStore, MAX_TEMPLATE_SIZE, TEMPLATE_EXTENSION, TemplateStore};
