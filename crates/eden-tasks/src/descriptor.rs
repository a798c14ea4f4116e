//! Task descriptors and where they come from

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use eden_core::BundlePaths;

use crate::error::GraphError;

/// Module used when a manifest does not name one
pub const DEFAULT_MODULE: &str = "shell";

/// Declarative description of one discovered task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Task name, unique within a build pass
    pub name: String,
    /// Module implementing the task, resolved through the task registry
    pub module_path: String,
    /// Names run before this task's own run
    #[serde(default)]
    pub before: Vec<String>,
    /// Names run after this task's own run
    #[serde(default)]
    pub after: Vec<String>,
    /// Module-specific options
    #[serde(default)]
    pub options: toml::Table,
    /// Manifest the descriptor was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl TaskDescriptor {
    /// Create a descriptor for a task module
    pub fn new(name: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_path: module_path.into(),
            ..Default::default()
        }
    }

    /// Add a name to run before this task
    pub fn with_before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// Add a name to run after this task
    pub fn with_after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    /// Set a module option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Name of the unit wrapping this task's own run
    pub fn run_name(&self) -> String {
        run_name(&self.name)
    }

    /// Check the descriptor carries the fields graph construction needs
    pub fn validate(&self, index: usize) -> Result<(), GraphError> {
        let origin = self
            .source
            .as_ref()
            .map(|p| format!(" ({})", p.display()))
            .unwrap_or_default();

        if self.name.trim().is_empty() {
            return Err(GraphError::MalformedDescriptor {
                index,
                reason: format!("missing name{}", origin),
            });
        }

        if self.module_path.trim().is_empty() {
            return Err(GraphError::MalformedDescriptor {
                index,
                reason: format!("task '{}' has no module path{}", self.name, origin),
            });
        }

        Ok(())
    }
}

/// Name of the unit wrapping a task's own run
pub fn run_name(task: &str) -> String {
    format!("{}.run", task)
}

/// Name of a task's watch unit
pub fn watch_name(task: &str) -> String {
    format!("{}.watch", task)
}

/// Supplies descriptors in a deterministic discovery order
pub trait DescriptorSource {
    /// Discover every descriptor
    fn descriptors(&self) -> Result<Vec<TaskDescriptor>, GraphError>;
}

impl DescriptorSource for Vec<TaskDescriptor> {
    fn descriptors(&self) -> Result<Vec<TaskDescriptor>, GraphError> {
        Ok(self.clone())
    }
}

/// On-disk shape of a task manifest (`tasks/<name>.toml` inside a bundle)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskManifest {
    /// Task name
    #[serde(default)]
    pub name: Option<String>,
    /// Module implementing the task
    #[serde(default)]
    pub module: Option<String>,
    /// Names run before this task
    #[serde(default)]
    pub before: Vec<String>,
    /// Names run after this task
    #[serde(default)]
    pub after: Vec<String>,
    /// Everything else is handed to the module
    #[serde(flatten)]
    pub options: toml::Table,
}

impl TaskManifest {
    /// Parse a manifest file
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path).map_err(|e| GraphError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| GraphError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Convert into a descriptor
    pub fn into_descriptor(self, source: PathBuf) -> TaskDescriptor {
        TaskDescriptor {
            name: self.name.unwrap_or_default(),
            module_path: self.module.unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            before: self.before,
            after: self.after,
            options: self.options,
            source: Some(source),
        }
    }
}

/// Reads task manifests from every bundle directory
#[derive(Debug, Clone)]
pub struct ManifestSource {
    bundles: BundlePaths,
    pattern: String,
}

impl ManifestSource {
    /// Create a source matching `pattern` inside each bundle
    pub fn new(bundles: BundlePaths, pattern: impl Into<String>) -> Self {
        Self {
            bundles,
            pattern: pattern.into(),
        }
    }
}

impl DescriptorSource for ManifestSource {
    fn descriptors(&self) -> Result<Vec<TaskDescriptor>, GraphError> {
        let paths = self.bundles.glob(&[self.pattern.as_str()])?;
        debug!(pattern = %self.pattern, matches = paths.len(), "reading task manifests");

        let descriptors = paths
            .into_iter()
            .map(|path| TaskManifest::load(&path).map(|m| m.into_descriptor(path)))
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = descriptors.len(), "task descriptors discovered");
        Ok(descriptors)
    }
}
