//! Registry of task modules
//!
//! Descriptors name a module; the registry maps module names to factories
//! that construct the task. The graph builder only sees the [`TaskResolver`]
//! seam, so embedders can swap in their own resolution.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::{TaskDescriptor, DEFAULT_MODULE};
use crate::error::GraphError;
use crate::shell::ShellTask;
use crate::task::{Task, TaskContext};

/// Constructs a task from its descriptor
pub trait TaskFactory: Send + Sync {
    /// Create the task
    fn create(
        &self,
        descriptor: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<Arc<dyn Task>, GraphError>;
}

impl<F> TaskFactory for F
where
    F: Fn(&TaskDescriptor, &TaskContext) -> Result<Arc<dyn Task>, GraphError> + Send + Sync,
{
    fn create(
        &self,
        descriptor: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<Arc<dyn Task>, GraphError> {
        self(descriptor, ctx)
    }
}

/// Resolves a descriptor to a runnable task
pub trait TaskResolver {
    /// Resolve the descriptor's module and construct the task
    fn resolve(
        &self,
        descriptor: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<Arc<dyn Task>, GraphError>;
}

/// Module name to factory mapping
pub struct TaskRegistry {
    factories: HashMap<String, Arc<dyn TaskFactory>>,
}

impl TaskRegistry {
    /// Registry with the built-in modules
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_MODULE, |d: &TaskDescriptor, ctx: &TaskContext| {
            ShellTask::from_descriptor(d, ctx).map(|t| Arc::new(t) as Arc<dyn Task>)
        });
        registry
    }

    /// Registry without any modules
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a module, replacing any previous factory of the same name
    pub fn register<F: TaskFactory + 'static>(&mut self, module: impl Into<String>, factory: F) {
        self.factories.insert(module.into(), Arc::new(factory));
    }

    /// Whether a module is registered
    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    /// Registered module names, sorted
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskResolver for TaskRegistry {
    fn resolve(
        &self,
        descriptor: &TaskDescriptor,
        ctx: &TaskContext,
    ) -> Result<Arc<dyn Task>, GraphError> {
        let factory =
            self.factories
                .get(&descriptor.module_path)
                .ok_or_else(|| GraphError::UnresolvedModule {
                    task: descriptor.name.clone(),
                    module: descriptor.module_path.clone(),
                })?;

        debug!(task = %descriptor.name, module = %descriptor.module_path, "resolving task");
        factory.create(descriptor, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskResult;
    use async_trait::async_trait;
    use eden_core::BundlePaths;

    struct Noop;

    #[async_trait]
    impl Task for Noop {
        async fn run(&self, _files: Option<&[String]>) -> TaskResult {
            Ok(())
        }
    }

    fn ctx() -> TaskContext {
        TaskContext::new("/srv/app", BundlePaths::default())
    }

    #[test]
    fn test_default_registry_has_shell() {
        let registry = TaskRegistry::new();
        assert!(registry.contains("shell"));
        assert_eq!(registry.modules(), vec!["shell"]);
    }

    #[test]
    fn test_register_closure() {
        let mut registry = TaskRegistry::empty();
        registry.register("noop", |_: &TaskDescriptor, _: &TaskContext| {
            Ok(Arc::new(Noop) as Arc<dyn Task>)
        });

        let task = registry
            .resolve(&TaskDescriptor::new("cleanup", "noop"), &ctx())
            .unwrap();
        assert!(task.watch().is_none());
    }

    #[test]
    fn test_unknown_module() {
        let registry = TaskRegistry::empty();
        let err = registry
            .resolve(&TaskDescriptor::new("cleanup", "missing"), &ctx())
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::UnresolvedModule { .. }));
    }
}
