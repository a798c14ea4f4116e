//! Eden Tasks - task graph construction and execution
//!
//! Task descriptors discovered across bundles are resolved to runnable tasks,
//! wired into per-task pipelines plus the default `install` and `watch`
//! entry points, and executed by the [`Engine`].

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod graph;
pub mod registry;
pub mod reporter;
pub mod shell;
pub mod task;
pub mod watcher;

pub use descriptor::{DescriptorSource, ManifestSource, TaskDescriptor, TaskManifest};
pub use engine::{Engine, Unit};
pub use error::{BoxError, EngineError, GraphError};
pub use graph::{compute_roots, RootSet, TaskGraph, TaskGraphBuilder, TaskRegistration, INSTALL, WATCH};
pub use registry::{TaskFactory, TaskRegistry, TaskResolver};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TracingReporter};
pub use shell::ShellTask;
pub use task::{RestartHook, Task, TaskContext, TaskResult};
