//! Task execution reporting

use std::path::PathBuf;
use std::time::Duration;

/// Events emitted while the engine runs units
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A task's run is starting
    Started { unit: String },
    /// A task's run completed successfully
    Completed { unit: String, duration: Duration },
    /// A task's run failed
    Failed {
        unit: String,
        duration: Duration,
        error: String,
    },
    /// A watch unit started watching
    Watching {
        unit: String,
        patterns: Vec<String>,
    },
    /// A watched file changed and the target is about to re-run
    Changed {
        unit: String,
        target: String,
        path: PathBuf,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { unit } => {
                tracing::info!("Starting {}", unit);
            }
            TaskEvent::Completed { unit, duration } => {
                tracing::info!("{} completed in {:.1}s", unit, duration.as_secs_f64());
            }
            TaskEvent::Failed {
                unit,
                duration,
                error,
            } => {
                tracing::error!("{} failed after {:.1}s: {}", unit, duration.as_secs_f64(), error);
            }
            TaskEvent::Watching { unit, patterns } => {
                tracing::info!("{} watching {} patterns", unit, patterns.len());
            }
            TaskEvent::Changed { unit, target, path } => {
                tracing::info!("{}: {} changed, re-running {}", unit, path.display(), target);
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Units that started, in order
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Started { unit } => Some(unit),
                _ => None,
            })
            .collect()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();

        reporter.report(&TaskEvent::Started {
            unit: "views.run".to_string(),
        });
        reporter.report(&TaskEvent::Completed {
            unit: "views.run".to_string(),
            duration: Duration::from_secs(5),
        });

        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.started(), vec!["views.run"]);
    }

    #[test]
    fn test_tracing_reporter() {
        let reporter = TracingReporter;

        // Just verify it doesn't panic
        reporter.report(&TaskEvent::Changed {
            unit: "views.watch".to_string(),
            target: "views".to_string(),
            path: PathBuf::from("bundles/shop/views/cart.html"),
        });
        reporter.report(&TaskEvent::Failed {
            unit: "views.run".to_string(),
            duration: Duration::from_secs(1),
            error: "exit code 1".to_string(),
        });
    }
}
