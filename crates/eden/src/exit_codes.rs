//! Exit codes for the CLI

use eden_core::{ConfigError, EdenError};
use eden_process::ProcessError;
use eden_tasks::{EngineError, GraphError};

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Task graph could not be built
pub const GRAPH_ERROR: i32 = 3;

/// A task failed while running
pub const TASK_ERROR: i32 = 4;

/// A process could not be launched or bootstrapped
pub const PROCESS_ERROR: i32 = 5;

/// Pick the exit code for the first recognised error in the chain
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| {
            if cause.is::<ConfigError>() {
                Some(CONFIG_ERROR)
            } else if let Some(EdenError::Config(_)) = cause.downcast_ref::<EdenError>() {
                Some(CONFIG_ERROR)
            } else if cause.is::<GraphError>() {
                Some(GRAPH_ERROR)
            } else if cause.is::<EngineError>() {
                Some(TASK_ERROR)
            } else if cause.is::<ProcessError>() {
                Some(PROCESS_ERROR)
            } else {
                None
            }
        })
        .unwrap_or(ERROR)
}
