//! Errors raised while building and running task graphs

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by task implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors during task graph construction.
///
/// Any of these aborts the whole build pass; nothing is registered.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A descriptor is missing its name or module path
    #[error("Malformed task descriptor #{index}: {reason}")]
    MalformedDescriptor { index: usize, reason: String },

    /// No factory is registered for the descriptor's module
    #[error("Task '{task}' uses unknown module '{module}'")]
    UnresolvedModule { task: String, module: String },

    /// The module rejected the descriptor's options
    #[error("Task '{task}' is invalid: {reason}")]
    InvalidTask { task: String, reason: String },

    /// A task manifest could not be read or parsed
    #[error("Failed to load task manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    /// Bundle search paths could not be expanded
    #[error(transparent)]
    Core(#[from] eden_core::EdenError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while running registered units
#[derive(Debug, Error)]
pub enum EngineError {
    /// A series or group references a name that was never registered
    #[error("Unit '{0}' is not registered")]
    UnknownUnit(String),

    /// A series refers back to itself
    #[error("Unit '{0}' depends on itself")]
    Cycle(String),

    /// A task's run failed
    #[error("Task '{unit}' failed: {reason}")]
    TaskFailed { unit: String, reason: String },

    /// The file watcher could not be started
    #[error("Watch '{unit}' failed: {reason}")]
    Watch { unit: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::UnresolvedModule {
            task: "assets".to_string(),
            module: "webpack".to_string(),
        };
        assert_eq!(err.to_string(), "Task 'assets' uses unknown module 'webpack'");
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::TaskFailed {
            unit: "assets.run".to_string(),
            reason: "exit code 2".to_string(),
        };
        assert_eq!(err.to_string(), "Task 'assets.run' failed: exit code 2");
    }
}
