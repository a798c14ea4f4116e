//! Application loading shared by the commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use eden_core::config::load_config_or_default;
use eden_core::{BundlePaths, Config};
use eden_tasks::{
    DescriptorSource, Engine, ManifestSource, RestartHook, TaskContext, TaskGraph,
    TaskGraphBuilder, TaskRegistry, TaskReporter,
};

/// A loaded application: root directory, configuration and bundle roots
#[derive(Debug, Clone)]
pub struct Project {
    /// Application root (the directory holding the config file)
    pub root: PathBuf,
    /// Loaded configuration
    pub config: Config,
    /// Config file, when one was found
    pub config_path: Option<PathBuf>,
    /// Bundle search paths
    pub bundles: BundlePaths,
}

impl Project {
    /// Load the application around the current directory
    pub fn load() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let (config, config_path) =
            load_config_or_default(&cwd).context("Failed to load configuration")?;

        let root = config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or(cwd);

        let bundles = BundlePaths::discover(&root, &config.bundles);
        if bundles.is_empty() {
            warn!(root = %root.display(), "no bundle directories found");
        }
        debug!(root = %root.display(), bundles = bundles.roots().len(), "project loaded");

        Ok(Self {
            root,
            config,
            config_path,
            bundles,
        })
    }

    /// Task context for this application
    pub fn context(&self) -> TaskContext {
        TaskContext::new(&self.root, self.bundles.clone()).with_cache_dir(&self.config.cache.dir)
    }

    /// Discover descriptors and build the task graph
    pub fn build_graph(&self, restart: Option<Arc<dyn RestartHook>>) -> anyhow::Result<TaskGraph> {
        let source = ManifestSource::new(self.bundles.clone(), self.config.bundles.tasks.clone());
        let descriptors = source
            .descriptors()
            .context("Failed to discover task manifests")?;

        let mut context = self.context();
        if let Some(hook) = restart {
            context = context.with_restart_hook(hook);
        }

        let registry = TaskRegistry::new();
        TaskGraphBuilder::new(&registry, context)
            .build(&descriptors)
            .context("Failed to build task graph")
    }

    /// Engine with the graph registered
    pub fn engine(&self, graph: &TaskGraph, reporter: Arc<dyn TaskReporter>) -> Engine {
        let mut engine =
            Engine::new(reporter).with_debounce(Duration::from_millis(self.config.watch.debounce_ms));
        graph.register(&mut engine);
        engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eden_tasks::{CollectingReporter, INSTALL};
    use tempfile::TempDir;

    fn write(root: &std::path::Path, path: &str, content: &str) {
        let path = root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn project(root: &std::path::Path) -> Project {
        let (config, config_path) = load_config_or_default(root).unwrap();
        Project {
            root: root.to_path_buf(),
            bundles: BundlePaths::discover(root, &config.bundles),
            config,
            config_path,
        }
    }

    #[test]
    fn test_graph_from_manifests() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "eden.toml", "name = \"shop\"\n");
        write(
            temp.path(),
            "bundles/shop/tasks/views.toml",
            "name = \"views\"\ncommand = \"true\"\nbefore = [\"clean\"]\n",
        );
        write(
            temp.path(),
            "bundles/shop/tasks/clean.toml",
            "name = \"clean\"\ncommand = \"true\"\n",
        );

        let project = project(temp.path());
        let graph = project.build_graph(None).unwrap();

        assert_eq!(graph.installers(), &["views"]);
        assert_eq!(graph.get("views").unwrap().pipeline, vec!["clean", "views.run"]);
        assert!(temp.path().join("data/cache").is_dir());
    }

    #[tokio::test]
    async fn test_install_runs_pipeline() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "bundles/shop/tasks/views.toml",
            "name = \"views\"\ncommand = \"echo views >> log.txt\"\nbefore = [\"clean\"]\n",
        );
        write(
            temp.path(),
            "bundles/shop/tasks/clean.toml",
            "name = \"clean\"\ncommand = \"echo clean >> log.txt\"\n",
        );

        let project = project(temp.path());
        let graph = project.build_graph(None).unwrap();
        let engine = project.engine(&graph, Arc::new(CollectingReporter::default()));
        engine.run(INSTALL).await.unwrap();

        let log = std::fs::read_to_string(temp.path().join("log.txt")).unwrap();
        assert_eq!(log, "clean\nviews\n");
    }
}
