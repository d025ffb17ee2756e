//! Environment variable substitution.

use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

/// Resolves `${VAR_NAME}` patterns in a string.
///
/// # Errors
/// Returns [`ConfigError::ValidationError`] listing every undefined variable.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
    });

    let mut missing = Vec::new();
    let resolved = ENV_VAR_REGEX.replace_all(value, |cap: &regex::Captures<'_>| {
        let var_name = &cap[1];
        std::env::var(var_name).unwrap_or_else(|_| {
            missing.push(var_name.to_string());
            String::new()
        })
    });

    if missing.is_empty() {
        Ok(resolved.into_owned())
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if missing.len() > 1 { "s" } else { "" },
            missing.join(", ")
        )))
    }
}
