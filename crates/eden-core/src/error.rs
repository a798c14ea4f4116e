//! Error types for Eden

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using EdenError
pub type Result<T> = std::result::Result<T, EdenError>;

/// Main error type for Eden core operations
#[derive(Debug, Error)]
pub enum EdenError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Bundle search path errors
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Bundle search path errors
#[derive(Debug, Error)]
pub enum BundleError {
    /// A resolved pattern is not a valid glob
    #[error("Invalid bundle pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A matched path could not be read while globbing
    #[error("Failed to read bundle path: {0}")]
    Unreadable(String),
}

impl EdenError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_transparent() {
        let err: EdenError = ConfigError::InvalidValue {
            field: "cluster.roles".to_string(),
            message: "role names cannot be empty".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: cluster.roles - role names cannot be empty"
        );
    }

    #[test]
    fn test_other_error() {
        assert_eq!(EdenError::other("boom").to_string(), "boom");
    }
}
