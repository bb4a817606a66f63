//! Regex patterns for config scanning.

use regex::Regex;
use std::sync::LazyLock;
use toposhift_topology::ConfigMap;

/// Whole-value variable placeholder: `$NAME` or `${NAME}`.
pub static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))$").unwrap()
});

/// Config key names that usually hold secrets.
pub static SECRET_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|passwd|pwd|secret|token|api[_-]?key|apikey|access[_-]?key|private[_-]?key|credentials?|jwt)").unwrap()
});

/// URLs with inline credentials, e.g. `postgres://user:pass@db:5432/app`.
pub static CREDENTIAL_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*://[^:/@\s]+:[^@\s]+@\S+$").unwrap());

/// Extract the variable name from a placeholder value.
pub fn variable_name(value: &str) -> Option<&str> {
    let caps = VARIABLE_PATTERN.captures(value)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Check if a key name looks like it contains a secret.
pub fn is_sensitive_key(key: &str) -> bool {
    SECRET_KEY_PATTERN.is_match(key)
}

/// Keys of a config map that name a secret or carry credentials in their value.
pub fn sensitive_keys(config: &ConfigMap) -> Vec<&str> {
    config
        .iter()
        .filter(|(key, value)| {
            is_sensitive_key(key)
                || value
                    .as_str()
                    .is_some_and(|s| CREDENTIAL_URL_PATTERN.is_match(s))
        })
        .map(|(key, _)| key.as_str())
        .collect()
}
