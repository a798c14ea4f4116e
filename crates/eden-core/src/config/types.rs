//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Roles launched by the cluster master when nothing else is configured
pub const DEFAULT_ROLES: &[&str] = &["front", "back"];

/// Main configuration for Eden
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub name: Option<String>,

    /// Bundle discovery configuration
    pub bundles: BundlesConfig,

    /// Cluster (multi-role) configuration
    pub cluster: ClusterConfig,

    /// Per-role launch configuration
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,

    /// File watching configuration
    pub watch: WatchConfig,

    /// Task cache configuration
    pub cache: CacheConfig,
}

impl Config {
    /// Look up the launch configuration for a role
    pub fn role(&self, name: &str) -> Option<&RoleConfig> {
        self.roles.get(name)
    }
}

/// Bundle discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlesConfig {
    /// Directory holding installed bundle packages, relative to the app root
    pub packages_dir: PathBuf,

    /// Additional local module roots that contribute bundles
    #[serde(default)]
    pub modules: Vec<PathBuf>,

    /// Task manifest pattern, relative to each bundle directory
    pub tasks: String,
}

impl Default for BundlesConfig {
    fn default() -> Self {
        Self {
            packages_dir: PathBuf::from("packages"),
            modules: Vec::new(),
            tasks: "tasks/*.toml".to_string(),
        }
    }
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Roles to launch, one worker process each
    pub roles: Vec<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            roles: DEFAULT_ROLES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Launch configuration for a single role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Shell command the worker runs for this role
    pub command: Option<String>,

    /// Extra environment variables for the role's command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// File watching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Debounce window for repeated change events on the same path
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

/// Task cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory, relative to the app root
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/cache"),
        }
    }
}
