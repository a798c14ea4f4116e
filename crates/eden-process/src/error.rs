//! Process supervision errors

use thiserror::Error;

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Errors raised while launching or bootstrapping processes
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to start the process
    #[error("Failed to launch '{role}': {source}")]
    Launch {
        role: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker started for a role nothing knows how to bootstrap
    #[error("No bootstrap registered for role '{0}'")]
    UnknownRole(String),

    /// A role bootstrap ran and failed
    #[error("Bootstrap for role '{role}' failed: {reason}")]
    Bootstrap { role: String, reason: String },

    /// A dev server restart cycle failed
    #[error("Dev server restart failed: {0}")]
    Restart(String),

    /// Signal handler installation or other IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
