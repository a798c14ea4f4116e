//! Task graph construction
//!
//! Turns descriptors discovered across bundles into:
//! - one series per task: `before ++ [<name>.run] ++ after`
//! - an optional watch unit per task that re-runs the task's series
//! - the default `install` series over the root tasks
//! - the `watch` parallel group over every watch unit
//!
//! Root tasks are the names never referenced from another descriptor's
//! `before` or `after`. A reference removes a name from the roots regardless
//! of discovery order, and removed names never come back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::descriptor::{run_name, watch_name, TaskDescriptor};
use crate::engine::Engine;
use crate::error::GraphError;
use crate::registry::TaskResolver;
use crate::task::{Task, TaskContext};

/// Name of the series running every root task
pub const INSTALL: &str = "install";

/// Name of the parallel group running every watch unit
pub const WATCH: &str = "watch";

/// Insertion-ordered set of root task names.
///
/// Membership is tracked in a map and consulted when the set is read, so
/// removals never shift the positions of other entries.
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    order: Vec<String>,
    members: HashMap<String, bool>,
}

impl RootSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a name; a name inserted before keeps its first position
    pub fn insert(&mut self, name: &str) {
        match self.members.get_mut(name) {
            Some(member) => *member = true,
            None => {
                self.order.push(name.to_string());
                self.members.insert(name.to_string(), true);
            }
        }
    }

    /// Remove a name if present
    pub fn remove(&mut self, name: &str) {
        if let Some(member) = self.members.get_mut(name) {
            *member = false;
        }
    }

    /// Whether a name is currently a root
    pub fn contains(&self, name: &str) -> bool {
        self.members.get(name).copied().unwrap_or(false)
    }

    /// Number of current roots
    pub fn len(&self) -> usize {
        self.members.values().filter(|m| **m).count()
    }

    /// Whether there are no roots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current roots in first-insertion order
    pub fn to_vec(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.contains(name))
            .cloned()
            .collect()
    }
}

/// Compute the root names for descriptors in discovery order
pub fn compute_roots(descriptors: &[TaskDescriptor]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut roots = RootSet::new();

    for descriptor in descriptors {
        if seen.insert(descriptor.name.as_str()) {
            roots.insert(&descriptor.name);
        }

        for dependency in descriptor.before.iter().chain(&descriptor.after) {
            seen.insert(dependency.as_str());
            roots.remove(dependency);
        }
    }

    roots.to_vec()
}

/// One task's registrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRegistration {
    /// Task name, also the name of its series
    pub name: String,
    /// Series members: `before ++ [<name>.run] ++ after`
    pub pipeline: Vec<String>,
    /// Watch unit name, when the task watches files
    pub watch_name: Option<String>,
    /// Watch patterns resolved against the bundle search paths
    pub watch_patterns: Vec<String>,
}

/// A fully resolved graph, ready to register with an [`Engine`]
#[derive(Clone)]
pub struct TaskGraph {
    installers: Vec<String>,
    registrations: Vec<TaskRegistration>,
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskGraph {
    /// Root task names run by `install`, in order
    pub fn installers(&self) -> &[String] {
        &self.installers
    }

    /// Per-task registrations in discovery order
    pub fn registrations(&self) -> &[TaskRegistration] {
        &self.registrations
    }

    /// Look up a task's registration
    pub fn get(&self, name: &str) -> Option<&TaskRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    /// Watch unit names in discovery order
    pub fn watchers(&self) -> Vec<String> {
        self.registrations
            .iter()
            .filter_map(|r| r.watch_name.clone())
            .collect()
    }

    /// Number of distinct tasks
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether the graph has no tasks
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Register every unit with the engine
    pub fn register(&self, engine: &mut Engine) {
        for registration in &self.registrations {
            let Some(task) = self.tasks.get(&registration.name) else {
                continue;
            };

            let files = registration
                .watch_name
                .as_ref()
                .map(|_| registration.watch_patterns.clone());
            engine.register_task(run_name(&registration.name), task.clone(), files);
            engine.register_series(&registration.name, registration.pipeline.clone());

            if let Some(watch) = &registration.watch_name {
                engine.register_watch(
                    watch,
                    registration.watch_patterns.clone(),
                    &registration.name,
                );
            }
        }

        engine.register_series(INSTALL, self.installers.clone());
        engine.register_parallel(WATCH, self.watchers());

        info!(
            tasks = self.registrations.len(),
            installers = self.installers.len(),
            "task graph registered"
        );
    }

    /// Human-readable summary of the graph
    pub fn plan(&self) -> String {
        let mut plan = String::new();
        plan.push_str(&format!("{} ({} tasks):\n", INSTALL, self.installers.len()));
        for name in &self.installers {
            plan.push_str(&format!("  {}\n", name));
        }

        plan.push_str("pipelines:\n");
        for registration in &self.registrations {
            plan.push_str(&format!(
                "  {} -> {}\n",
                registration.name,
                registration.pipeline.join(", ")
            ));
        }

        let watchers: Vec<&TaskRegistration> = self
            .registrations
            .iter()
            .filter(|r| r.watch_name.is_some())
            .collect();
        if !watchers.is_empty() {
            plan.push_str(&format!("{} ({} units):\n", WATCH, watchers.len()));
            for registration in watchers {
                plan.push_str(&format!(
                    "  {} -> {}\n",
                    registration.name,
                    registration.watch_patterns.join(", ")
                ));
            }
        }
        plan
    }
}

/// Builds a [`TaskGraph`] from descriptors
pub struct TaskGraphBuilder<'a> {
    resolver: &'a dyn TaskResolver,
    context: TaskContext,
}

impl<'a> TaskGraphBuilder<'a> {
    /// Create a builder resolving modules through `resolver`
    pub fn new(resolver: &'a dyn TaskResolver, context: TaskContext) -> Self {
        Self { resolver, context }
    }

    /// Build the graph.
    ///
    /// Every descriptor is validated and resolved before anything is
    /// returned, so a failure never leaves a partial graph behind.
    #[instrument(skip_all, fields(descriptors = descriptors.len()))]
    pub fn build(&self, descriptors: &[TaskDescriptor]) -> Result<TaskGraph, GraphError> {
        for (index, descriptor) in descriptors.iter().enumerate() {
            descriptor.validate(index)?;
        }

        self.context.ensure_cache_dir()?;

        let installers = compute_roots(descriptors);

        let mut registrations: Vec<TaskRegistration> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut tasks: HashMap<String, Arc<dyn Task>> = HashMap::new();

        for descriptor in descriptors {
            let task = self.resolver.resolve(descriptor, &self.context)?;
            let registration = self.registration(descriptor, task.as_ref());

            match positions.get(&descriptor.name) {
                Some(&index) => {
                    debug!(task = %descriptor.name, "later descriptor replaces earlier one");
                    registrations[index] = registration;
                }
                None => {
                    positions.insert(descriptor.name.clone(), registrations.len());
                    registrations.push(registration);
                }
            }
            tasks.insert(descriptor.name.clone(), task);
        }

        info!(
            tasks = registrations.len(),
            installers = installers.len(),
            watchers = registrations.iter().filter(|r| r.watch_name.is_some()).count(),
            "task graph built"
        );

        Ok(TaskGraph {
            installers,
            registrations,
            tasks,
        })
    }

    fn registration(&self, descriptor: &TaskDescriptor, task: &dyn Task) -> TaskRegistration {
        let mut pipeline = descriptor.before.clone();
        pipeline.push(descriptor.run_name());
        pipeline.extend(descriptor.after.iter().cloned());

        let (watch_name, watch_patterns) = match task.watch() {
            Some(patterns) => (
                Some(watch_name(&descriptor.name)),
                self.context.bundles().files(&patterns),
            ),
            None => (None, Vec::new()),
        };

        TaskRegistration {
            name: descriptor.name.clone(),
            pipeline,
            watch_name,
            watch_patterns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRegistry;
    use crate::reporter::CollectingReporter;
    use crate::task::TaskResult;
    use async_trait::async_trait;
    use eden_core::BundlePaths;
    use tempfile::TempDir;

    struct Stub {
        watch: Option<Vec<String>>,
    }

    #[async_trait]
    impl Task for Stub {
        async fn run(&self, _files: Option<&[String]>) -> TaskResult {
            Ok(())
        }

        fn watch(&self) -> Option<Vec<String>> {
            self.watch.clone()
        }
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::empty();
        registry.register("stub", |d: &TaskDescriptor, _: &TaskContext| {
            let watch = d
                .options
                .get("watch")
                .and_then(|v| v.as_str())
                .map(|p| vec![p.to_string()]);
            Ok(Arc::new(Stub { watch }) as Arc<dyn Task>)
        });
        registry
    }

    fn task(name: &str) -> TaskDescriptor {
        TaskDescriptor::new(name, "stub")
    }

    fn build(descriptors: &[TaskDescriptor]) -> (TempDir, Result<TaskGraph, GraphError>) {
        let temp = TempDir::new().unwrap();
        let registry = registry();
        let context = TaskContext::new(temp.path(), BundlePaths::new(["lib/", "app/"]));
        let result = TaskGraphBuilder::new(&registry, context).build(descriptors);
        (temp, result)
    }

    #[test]
    fn test_root_set_keeps_first_position() {
        let mut roots = RootSet::new();
        roots.insert("a");
        roots.insert("b");
        roots.insert("a");
        assert_eq!(roots.to_vec(), vec!["a", "b"]);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn test_root_set_remove_does_not_shift() {
        let mut roots = RootSet::new();
        for name in ["a", "b", "c", "d"] {
            roots.insert(name);
        }
        roots.remove("b");
        roots.remove("c");
        roots.remove("missing");
        assert_eq!(roots.to_vec(), vec!["a", "d"]);
        assert!(!roots.contains("b"));
    }

    #[test]
    fn test_roots_example() {
        let descriptors = vec![
            task("A"),
            task("B").with_before("A"),
            task("C").with_after("A"),
        ];
        assert_eq!(compute_roots(&descriptors), vec!["B", "C"]);
    }

    #[test]
    fn test_dependency_excluded_regardless_of_order() {
        let forward = vec![task("css").with_before("sass"), task("sass")];
        let backward = vec![task("sass"), task("css").with_before("sass")];
        assert_eq!(compute_roots(&forward), vec!["css"]);
        assert_eq!(compute_roots(&backward), vec!["css"]);
    }

    #[test]
    fn test_removed_name_never_returns() {
        let descriptors = vec![
            task("a"),
            task("b").with_after("a"),
            task("a"),
            task("c"),
        ];
        assert_eq!(compute_roots(&descriptors), vec!["b", "c"]);
    }

    #[test]
    fn test_undeclared_dependency_is_not_a_root() {
        let descriptors = vec![task("views").with_before("clean")];
        assert_eq!(compute_roots(&descriptors), vec!["views"]);
    }

    #[test]
    fn test_duplicate_roots_are_idempotent() {
        let descriptors = vec![task("x"), task("y"), task("x"), task("z")];
        assert_eq!(compute_roots(&descriptors), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_pipelines() {
        let (_temp, graph) = build(&[
            task("A"),
            task("B").with_before("A"),
            task("C").with_after("A"),
        ]);
        let graph = graph.unwrap();

        assert_eq!(graph.installers(), &["B", "C"]);
        assert_eq!(graph.get("A").unwrap().pipeline, vec!["A.run"]);
        assert_eq!(graph.get("B").unwrap().pipeline, vec!["A", "B.run"]);
        assert_eq!(graph.get("C").unwrap().pipeline, vec!["C.run", "A"]);
    }

    #[test]
    fn test_registered_pipelines_flatten_to_runs() {
        let (_temp, graph) = build(&[
            task("A"),
            task("B").with_before("A"),
            task("C").with_after("A"),
        ]);
        let graph = graph.unwrap();
        let mut engine = Engine::new(Arc::new(CollectingReporter::default()));
        graph.register(&mut engine);

        assert_eq!(engine.flatten("B").unwrap(), vec!["A.run", "B.run"]);
        assert_eq!(engine.flatten("C").unwrap(), vec!["C.run", "A.run"]);
        assert_eq!(
            engine.flatten(INSTALL).unwrap(),
            vec!["A.run", "B.run", "C.run", "A.run"]
        );
    }

    #[test]
    fn test_watch_units_resolved_against_bundles() {
        let (_temp, graph) = build(&[
            task("views").with_option("watch", "views/**/*.html"),
            task("config"),
        ]);
        let graph = graph.unwrap();

        let views = graph.get("views").unwrap();
        assert_eq!(views.watch_name.as_deref(), Some("views.watch"));
        assert_eq!(
            views.watch_patterns,
            vec!["lib/views/**/*.html", "app/views/**/*.html"]
        );
        assert!(graph.get("config").unwrap().watch_name.is_none());
        assert_eq!(graph.watchers(), vec!["views.watch"]);
    }

    #[test]
    fn test_register_watch_group() {
        let (_temp, graph) = build(&[
            task("views").with_option("watch", "views/*.html"),
            task("css").with_option("watch", "css/*.css"),
        ]);
        let mut engine = Engine::new(Arc::new(CollectingReporter::default()));
        graph.unwrap().register(&mut engine);

        assert!(engine.contains("views.watch"));
        assert!(engine.contains("css.watch"));
        assert!(engine.contains(WATCH));
        assert!(engine.contains(INSTALL));
    }

    #[test]
    fn test_malformed_descriptor_aborts() {
        let (_temp, result) = build(&[task("ok"), TaskDescriptor::new("", "stub")]);
        assert!(matches!(
            result.err().unwrap(),
            GraphError::MalformedDescriptor { index: 1, .. }
        ));
    }

    #[test]
    fn test_unresolvable_module_aborts() {
        let (_temp, result) = build(&[task("ok"), TaskDescriptor::new("bad", "missing")]);
        assert!(matches!(
            result.err().unwrap(),
            GraphError::UnresolvedModule { .. }
        ));
    }

    #[test]
    fn test_later_duplicate_replaces_registration() {
        let (_temp, graph) = build(&[
            task("views").with_option("watch", "views/*.html"),
            task("css"),
            task("views").with_before("css"),
        ]);
        let graph = graph.unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.registrations()[0].name, "views");
        assert_eq!(graph.get("views").unwrap().pipeline, vec!["css", "views.run"]);
        assert!(graph.watchers().is_empty());
        assert_eq!(graph.installers(), &["views"]);
    }

    #[test]
    fn test_build_creates_cache_dir() {
        let (temp, graph) = build(&[task("a")]);
        assert!(graph.is_ok());
        assert!(temp.path().join("data/cache").is_dir());
    }

    #[test]
    fn test_plan_lists_everything() {
        let (_temp, graph) = build(&[
            task("A"),
            task("B").with_before("A").with_option("watch", "b/*.txt"),
        ]);
        let plan = graph.unwrap().plan();

        assert!(plan.contains("install (1 tasks)"));
        assert!(plan.contains("B -> A, B.run"));
        assert!(plan.contains("watch (1 units)"));
        assert!(plan.contains("lib/b/*.txt"));
    }
}
