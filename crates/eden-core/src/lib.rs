//! Eden Core - shared foundations for the Eden orchestrator
//!
//! This crate provides error handling, configuration loading and the bundle
//! search paths that the task graph and process supervisor build on.

pub mod bundles;
pub mod config;
pub mod error;

/// Environment variable selecting the single role a worker process runs as
pub const ROLE_ENV: &str = "EDEN_CLUSTER";

/// Environment variable listing every role the cluster master should launch
pub const ROLES_ENV: &str = "EDEN_CLUSTERS";

/// Environment variable carrying the runtime environment name
pub const ENV_NAME_ENV: &str = "EDEN_ENV";

pub use bundles::BundlePaths;
pub use config::{Config, RoleConfig};
pub use error::{BundleError, ConfigError, EdenError, Result};
