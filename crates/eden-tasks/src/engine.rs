//! Named unit registry and async executor
//!
//! Units reference each other by name and are resolved when they run, so a
//! series may name a task registered after it. Unknown names and cycles are
//! reported at run time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::reporter::{TaskEvent, TaskReporter};
use crate::task::Task;
use crate::watcher::FileWatcher;

/// Default window for collapsing repeated change events
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// A registered unit
#[derive(Clone)]
pub enum Unit {
    /// A task's run, with the watch patterns handed to it
    Task {
        task: Arc<dyn Task>,
        files: Option<Vec<String>>,
    },
    /// Members run one after another; the first failure stops the series
    Series(Vec<String>),
    /// Members run concurrently
    Parallel(Vec<String>),
    /// Re-runs `target` whenever a file matching `patterns` changes
    Watch {
        patterns: Vec<String>,
        target: String,
    },
}

impl Unit {
    /// Short kind label
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Task { .. } => "task",
            Unit::Series(_) => "series",
            Unit::Parallel(_) => "parallel",
            Unit::Watch { .. } => "watch",
        }
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Task { files, .. } => f.debug_struct("Task").field("files", files).finish(),
            Unit::Series(members) => f.debug_tuple("Series").field(members).finish(),
            Unit::Parallel(members) => f.debug_tuple("Parallel").field(members).finish(),
            Unit::Watch { patterns, target } => f
                .debug_struct("Watch")
                .field("patterns", patterns)
                .field("target", target)
                .finish(),
        }
    }
}

/// Executes registered units
pub struct Engine {
    units: HashMap<String, Unit>,
    reporter: Arc<dyn TaskReporter>,
    debounce: Duration,
}

impl Engine {
    /// Create an empty engine
    pub fn new(reporter: Arc<dyn TaskReporter>) -> Self {
        Self {
            units: HashMap::new(),
            reporter,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Set the debounce window used by watch units
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Register a task run. A later registration under the same name wins.
    pub fn register_task(
        &mut self,
        name: impl Into<String>,
        task: Arc<dyn Task>,
        files: Option<Vec<String>>,
    ) {
        self.insert(name.into(), Unit::Task { task, files });
    }

    /// Register a series
    pub fn register_series(&mut self, name: impl Into<String>, members: Vec<String>) {
        self.insert(name.into(), Unit::Series(members));
    }

    /// Register a parallel group
    pub fn register_parallel(&mut self, name: impl Into<String>, members: Vec<String>) {
        self.insert(name.into(), Unit::Parallel(members));
    }

    /// Register a watch unit
    pub fn register_watch(
        &mut self,
        name: impl Into<String>,
        patterns: Vec<String>,
        target: impl Into<String>,
    ) {
        self.insert(
            name.into(),
            Unit::Watch {
                patterns,
                target: target.into(),
            },
        );
    }

    fn insert(&mut self, name: String, unit: Unit) {
        debug!(unit = %name, kind = unit.kind(), "registering unit");
        if self.units.insert(name.clone(), unit).is_some() {
            debug!(unit = %name, "replaced existing unit");
        }
    }

    /// Look up a unit
    pub fn get(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// Whether a unit is registered
    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Registered unit names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Task runs a unit would execute, in series order.
    ///
    /// Parallel members are listed in declaration order; a watch unit lists
    /// its target.
    pub fn flatten(&self, name: &str) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.flatten_into(name, &mut stack, &mut out)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        if stack.iter().any(|n| n == name) {
            return Err(EngineError::Cycle(name.to_string()));
        }
        let unit = self
            .units
            .get(name)
            .ok_or_else(|| EngineError::UnknownUnit(name.to_string()))?;

        stack.push(name.to_string());
        match unit {
            Unit::Task { .. } => out.push(name.to_string()),
            Unit::Series(members) | Unit::Parallel(members) => {
                for member in members {
                    self.flatten_into(member, stack, out)?;
                }
            }
            Unit::Watch { target, .. } => self.flatten_into(target, stack, out)?,
        }
        stack.pop();
        Ok(())
    }

    /// Run a unit to completion.
    ///
    /// Watch units only return when their watcher stops.
    pub async fn run(&self, name: &str) -> Result<(), EngineError> {
        self.run_unit(name.to_string(), Vec::new()).await
    }

    fn run_unit(&self, name: String, stack: Vec<String>) -> BoxFuture<'_, Result<(), EngineError>> {
        async move {
            if stack.contains(&name) {
                return Err(EngineError::Cycle(name));
            }
            let unit = self
                .units
                .get(&name)
                .ok_or_else(|| EngineError::UnknownUnit(name.clone()))?;

            let mut stack = stack;
            stack.push(name.clone());

            match unit {
                Unit::Task { task, files } => self.run_task(&name, task, files.as_deref()).await,
                Unit::Series(members) => {
                    for member in members {
                        self.run_unit(member.clone(), stack.clone()).await?;
                    }
                    Ok(())
                }
                Unit::Parallel(members) => {
                    let results = join_all(
                        members
                            .iter()
                            .map(|member| self.run_unit(member.clone(), stack.clone())),
                    )
                    .await;
                    results.into_iter().collect::<Result<Vec<_>, _>>().map(|_| ())
                }
                Unit::Watch { patterns, target } => self.run_watch(&name, patterns, target).await,
            }
        }
        .boxed()
    }

    async fn run_task(
        &self,
        name: &str,
        task: &Arc<dyn Task>,
        files: Option<&[String]>,
    ) -> Result<(), EngineError> {
        self.reporter.report(&TaskEvent::Started {
            unit: name.to_string(),
        });
        let start = Instant::now();

        match task.run(files).await {
            Ok(()) => {
                self.reporter.report(&TaskEvent::Completed {
                    unit: name.to_string(),
                    duration: start.elapsed(),
                });
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.reporter.report(&TaskEvent::Failed {
                    unit: name.to_string(),
                    duration: start.elapsed(),
                    error: reason.clone(),
                });
                Err(EngineError::TaskFailed {
                    unit: name.to_string(),
                    reason,
                })
            }
        }
    }

    async fn run_watch(
        &self,
        name: &str,
        patterns: &[String],
        target: &str,
    ) -> Result<(), EngineError> {
        if !self.contains(target) {
            return Err(EngineError::UnknownUnit(target.to_string()));
        }

        let mut watcher =
            FileWatcher::start(patterns, self.debounce).map_err(|e| EngineError::Watch {
                unit: name.to_string(),
                reason: e.to_string(),
            })?;
        self.reporter.report(&TaskEvent::Watching {
            unit: name.to_string(),
            patterns: patterns.to_vec(),
        });

        while let Some(path) = watcher.next().await {
            self.reporter.report(&TaskEvent::Changed {
                unit: name.to_string(),
                target: target.to_string(),
                path,
            });
            // a failed re-run keeps the watch alive
            if let Err(e) = self.run_unit(target.to_string(), Vec::new()).await {
                warn!(unit = %name, error = %e, "re-run failed");
            }
        }
        Ok(())
    }
}
