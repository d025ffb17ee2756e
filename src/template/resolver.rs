//! Template resolution with fallback to the built-in template.

use std::sync::{Arc, LazyLock};

use minijinja::{AutoEscape, Environment, UndefinedBehavior};

use super::store::TemplateStore;
use crate::error::TemplateError;

/// Identifier under which the built-in template is compiled.
pub const FALLBACK_TEMPLATE_ID: &str = "builtin-fallback";

const FALLBACK_SOURCE: &str = include_str!("fallback.html");

static FALLBACK_TEMPLATE: LazyLock<CompiledTemplate> = LazyLock::new(|| {
    CompiledTemplate::compile(FALLBACK_TEMPLATE_ID, FALLBACK_SOURCE.to_string())
        .expect("built-in fallback template compiles")
});

/// A template parsed into its own HTML-escaping environment.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct CompiledTemplate {
    id: String,
    env: Arc<Environment<'static>>,
}

impl CompiledTemplate {
    /// Parse `source` as an HTML template.
    ///
    /// Missing variables render as empty strings; values are HTML-escaped.
    pub fn compile(id: &str, source: String) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_template_owned(id.to_string(), source)
            .map_err(|e| TemplateError::CompileFailed {
                id: id.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            id: id.to_string(),
            env: Arc::new(env),
        })
    }

    /// The built-in fallback template.
    pub fn fallback() -> &'static CompiledTemplate {
        &FALLBACK_TEMPLATE
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Evaluate the template against a serializable view model.
    pub fn render<S: serde::Serialize>(&self, view: S) -> Result<String, TemplateError> {
        let render_failed = |e: minijinja::Error| TemplateError::RenderFailed {
            message: e.to_string(),
        };
        self.env
            .get_template(&self.id)
            .map_err(render_failed)?
            .render(view)
            .map_err(render_failed)
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("id", &self.id)
            .finish()
    }
}

/// Outcome of resolving a template identifier.
#[derive(Debug, Clone)]
pub enum ResolvedTemplate {
    /// The requested template was loaded and compiled.
    Loaded(CompiledTemplate),
    /// The requested template was unavailable; the built-in one is used.
    Fallback(Arc<TemplateError>),
}

impl ResolvedTemplate {
    /// The template to render, whichever variant this is.
    pub fn template(&self) -> &CompiledTemplate {
        match self {
            ResolvedTemplate::Loaded(template) => template,
            ResolvedTemplate::Fallback(_) => CompiledTemplate::fallback(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolvedTemplate::Fallback(_))
    }
}

/// Resolves template identifiers against a [`TemplateStore`].
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
}

impl TemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Resolve `template_id`, falling back to the built-in template when it
    /// is absent, unreadable or fails to compile. Never fails.
    pub fn resolve(&self, template_id: &str) -> ResolvedTemplate {
        match self.load(template_id) {
            Ok(template) => {
                tracing::debug!(template_id = %template_id, "Template loaded");
                ResolvedTemplate::Loaded(template)
            }
            Err(e) => {
                tracing::warn!(
                    template_id = %template_id,
                    error = %e,
                    "Template unavailable, using built-in fallback"
                );
                metrics::counter!("formdispatch_template_fallbacks_total").increment(1);
                ResolvedTemplate::Fallback(Arc::new(e))
            }
        }
    }

    /// [`resolve`](Self::resolve) on tokio's blocking pool.
    ///
    /// Store reads may hit the filesystem and must not stall a runtime
    /// worker. A panic inside the store is resumed on the caller.
    pub async fn resolve_blocking(&self, template_id: &str) -> ResolvedTemplate {
        let resolver = self.clone();
        let id = template_id.to_string();
        match tokio::task::spawn_blocking(move || resolver.resolve(&id)).await {
            Ok(resolved) => resolved,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(
                    template_id = %template_id,
                    error = %e,
                    "Template resolution cancelled, using built-in fallback"
                );
                metrics::counter!("formdispatch_template_fallbacks_total").increment(1);
                ResolvedTemplate::Fallback(Arc::new(TemplateError::Unreadable {
                    id: template_id.to_string(),
                    message: e.to_string(),
                }))
            }
        }
    }

    fn load(&self, template_id: &str) -> Result<CompiledTemplate, TemplateError> {
        if !self.store.exists(template_id) {
            return Err(TemplateError::NotFound {
                id: template_id.to_string(),
            });
        }
        let source = self.store.read(template_id)?;
        CompiledTemplate::compile(template_id, source)
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory store; `broken` ids exist but fail to read.
    #[derive(Default)]
    struct MemoryStore {
        templates: HashMap<String, String>,
        broken: Vec<String>,
    }

    impl MemoryStore {
        fn with(id: &str, source: &str) -> Self {
            let mut store = Self::default();
            store.templates.insert(id.to_string(), source.to_string());
            store
        }
    }

    impl TemplateStore for MemoryStore {
        fn exists(&self, id: &str) -> bool {
            self.templates.contains_key(id) || self.broken.iter().any(|b| b == id)
        }

        fn read(&self, id: &str) -> Result<String, TemplateError> {
            if self.broken.iter().any(|b| b == id) {
                return Err(TemplateError::Unreadable {
                    id: id.to_string(),
                    message: "disk on fire".to_string(),
                });
            }
            self.templates
                .get(id)
                .cloned()
                .ok_or_else(|| TemplateError::NotFound { id: id.to_string() })
        }
    }

    fn resolver(store: MemoryStore) -> TemplateResolver {
        TemplateResolver::new(Arc::new(store))
    }

    #[test]
    fn resolves_existing_template() {
        let resolved = resolver(MemoryStore::with("contact", "<p>{{ name }}</p>")).resolve("contact");

        assert!(!resolved.is_fallback());
        assert_eq!(resolved.template().id(), "contact");
        assert_eq!(
            resolved.template().render(serde_json::json!({"name": "Ada"})).unwrap(),
            "<p>Ada</p>"
        );
    }

    #[test]
    fn absent_template_falls_back() {
        let resolved = resolver(MemoryStore::default()).resolve("missing");

        match &resolved {
            ResolvedTemplate::Fallback(reason) => {
                assert!(matches!(**reason, TemplateError::NotFound { .. }));
            }
            ResolvedTemplate::Loaded(_) => panic!("Expected fallback"),
        }
        assert_eq!(resolved.template().id(), FALLBACK_TEMPLATE_ID);
    }

    #[test]
    fn unreadable_template_falls_back() {
        let store = MemoryStore {
            broken: vec!["contact".to_string()],
            ..Default::default()
        };
        let resolved = resolver(store).resolve("contact");

        match resolved {
            ResolvedTemplate::Fallback(reason) => {
                assert!(reason.to_string().contains("disk on fire"));
            }
            ResolvedTemplate::Loaded(_) => panic!("Expected fallback"),
        }
    }

    #[test]
    fn uncompilable_template_falls_back() {
        let resolved = resolver(MemoryStore::with("contact", "{% if unclosed")).resolve("contact");

        match resolved {
            ResolvedTemplate::Fallback(reason) => {
                assert!(matches!(*reason, TemplateError::CompileFailed { .. }));
            }
            ResolvedTemplate::Loaded(_) => panic!("Expected fallback"),
        }
    }

    #[test]
    fn compiled_template_escapes_html() {
        let template =
            CompiledTemplate::compile("t", "<p>{{ name }}</p>".to_string()).unwrap();
        let html = template
            .render(serde_json::json!({"name": "<script>alert(1)</script>"}))
            .unwrap();

        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn compiled_template_renders_missing_fields_empty() {
        let template = CompiledTemplate::compile("t", "[{{ phone }}]".to_string()).unwrap();
        assert_eq!(template.render(serde_json::json!({})).unwrap(), "[]");
    }

    #[test]
    fn unknown_filter_fails_at_render_not_compile() {
        let template =
            CompiledTemplate::compile("t", "{{ name | no_such_filter }}".to_string()).unwrap();
        let result = template.render(serde_json::json!({"name": "Ada"}));
        assert!(matches!(result, Err(TemplateError::RenderFailed { .. })));
    }

    #[tokio::test]
    async fn resolve_blocking_matches_resolve() {
        let resolver = resolver(MemoryStore::with("contact", "<p>{{ name }}</p>"));

        let loaded = resolver.resolve_blocking("contact").await;
        assert!(!loaded.is_fallback());
        assert_eq!(loaded.template().id(), "contact");

        let missing = resolver.resolve_blocking("missing").await;
        assert!(missing.is_fallback());
    }

    #[tokio::test]
    async fn resolve_blocking_resumes_store_panic() {
        struct ExplodingStore;

        impl TemplateStore for ExplodingStore {
            fn exists(&self, _id: &str) -> bool {
                panic!("store exploded")
            }

            fn read(&self, _id: &str) -> Result<String, TemplateError> {
                unreachable!()
            }
        }

        let resolver = TemplateResolver::new(Arc::new(ExplodingStore));
        let result = futures_util::FutureExt::catch_unwind(std::panic::AssertUnwindSafe(
            resolver.resolve_blocking("contact"),
        ))
        .await;

        let panic = result.err().unwrap();
        assert_eq!(panic.downcast_ref::<&str>(), Some(&"store exploded"));
    }

    #[test]
    fn fallback_template_compiles() {
        assert_eq!(CompiledTemplate::fallback().id(), FALLBACK_TEMPLATE_ID);
    }
}
