//! Template source storage.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;

/// Maximum size of a template file (1MB).
pub const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// File extension of stored templates.
pub const TEMPLATE_EXTENSION: &str = "html";

/// Source of template text, keyed by template identifier.
///
/// Implementations may fail for any I/O reason; callers treat absence and
/// failure the same way.
pub trait TemplateStore: Send + Sync {
    /// Whether a template with this identifier is available.
    fn exists(&self, id: &str) -> bool;

    /// Read the raw template source.
    fn read(&self, id: &str) -> Result<String, TemplateError>;
}

/// Templates stored as `<dir>/<id>.html`.
///
/// Identifiers are restricted to `[A-Za-z0-9_-]` so they can never
/// escape the template directory.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Option<PathBuf> {
        static TEMPLATE_ID_REGEX: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

        TEMPLATE_ID_REGEX
            .is_match(id)
            .then(|| self.dir.join(format!("{}.{}", id, TEMPLATE_EXTENSION)))
    }
}

impl TemplateStore for FsTemplateStore {
    fn exists(&self, id: &str) -> bool {
        self.path_for(id).is_some_and(|path| path.is_file())
    }

    fn read(&self, id: &str) -> Result<String, TemplateError> {
        let path = self.path_for(id).ok_or_else(|| TemplateError::NotFound {
            id: id.to_string(),
        })?;

        let unreadable = |message: String| TemplateError::Unreadable {
            id: id.to_string(),
            message,
        };

        let metadata = std::fs::metadata(&path)
            .map_err(|e| unreadable(format!("{}: {}", path.display(), e)))?;

        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(unreadable(format!(
                "{} exceeds maximum size of 1MB ({} bytes)",
                path.display(),
                metadata.len()
            )));
        }

        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                unreadable(format!("{} must be valid UTF-8", path.display()))
            } else {
                unreadable(format!("{}: {}", path.display(), e))
            }
        })
    }
}
