//! Task capability and the context tasks are constructed with

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use eden_core::BundlePaths;

use crate::error::{BoxError, GraphError};

/// Result of a single task run
pub type TaskResult = std::result::Result<(), BoxError>;

/// A discovered unit of work.
///
/// Implementations are created by a [`TaskFactory`](crate::registry::TaskFactory)
/// once per build pass and may be run many times (once per install, and again
/// on every watch trigger).
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task.
    ///
    /// `files` holds the watch patterns resolved against the bundle search
    /// paths when the task watches anything, `None` otherwise.
    async fn run(&self, files: Option<&[String]>) -> TaskResult;

    /// Glob patterns (relative to each bundle) whose changes re-run the task
    fn watch(&self) -> Option<Vec<String>> {
        None
    }
}

/// Hook through which tasks ask for the dev server to be restarted
pub trait RestartHook: Send + Sync {
    /// Request a restart; returns immediately
    fn request_restart(&self);
}

/// Shared state handed to task factories
#[derive(Clone)]
pub struct TaskContext {
    app_root: PathBuf,
    bundles: BundlePaths,
    cache_dir: PathBuf,
    restart: Option<Arc<dyn RestartHook>>,
}

impl TaskContext {
    /// Create a context for an application root
    pub fn new(app_root: impl Into<PathBuf>, bundles: BundlePaths) -> Self {
        let app_root = app_root.into();
        let cache_dir = app_root.join("data").join("cache");
        Self {
            app_root,
            bundles,
            cache_dir,
            restart: None,
        }
    }

    /// Set the cache directory (relative paths resolve against the app root)
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = self.app_root.join(dir);
        self
    }

    /// Inject the dev server restart hook
    pub fn with_restart_hook(mut self, hook: Arc<dyn RestartHook>) -> Self {
        self.restart = Some(hook);
        self
    }

    /// Application root directory
    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Bundle search paths
    pub fn bundles(&self) -> &BundlePaths {
        &self.bundles
    }

    /// Cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Restart hook, when running under the dev server
    pub fn restart_hook(&self) -> Option<Arc<dyn RestartHook>> {
        self.restart.clone()
    }

    /// Create the cache directory if it is missing
    pub fn ensure_cache_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)
    }

    /// Write a JSON document to `<cache dir>/<name>.json`
    pub fn write_cache<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, GraphError> {
        self.ensure_cache_dir()?;
        let path = self.cache_dir.join(format!("{}.json", name));
        let json = serde_json::to_vec_pretty(value).map_err(eden_core::EdenError::from)?;
        std::fs::write(&path, json)?;
        debug!(path = %path.display(), "cache file written");
        Ok(path)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("app_root", &self.app_root)
            .field("bundles", &self.bundles)
            .field("cache_dir", &self.cache_dir)
            .field("restart", &self.restart.is_some())
            .finish()
    }
}
