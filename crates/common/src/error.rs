//! Common error types for toposhift.

use thiserror::Error;

/// Common error type for toposhift operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid topology {topology}: {reason}")]
    InvalidTopology { topology: String, reason: String },

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_topology_message() {
        let err = Error::InvalidTopology {
            topology: "prod".to_string(),
            reason: "wire w1 has no target".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid topology prod: wire w1 has no target");
    }

    #[test]
    fn test_from_anyhow() {
        let err: Error = anyhow::anyhow!("boom").into();
        assert!(matches!(err, Error::Other(ref m) if m == "boom"));
    }
}
