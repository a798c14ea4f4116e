//! Console task reporter

use std::sync::Arc;

use console::style;

use eden_tasks::{TaskEvent, TaskReporter, TracingReporter};

use crate::cli::output;
use crate::cli::{Cli, OutputFormat};

/// Pick the reporter for the CLI flags
pub fn for_cli(cli: &Cli) -> Arc<dyn TaskReporter> {
    if cli.quiet || cli.format == OutputFormat::Json {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new(cli.verbose))
    }
}

/// Console reporter with live output
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a reporter; verbose mode also prints task starts and patterns
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { unit } => {
                if self.verbose {
                    println!("  {} {}", style("▸").dim(), output::unit_style().apply_to(unit));
                }
            }
            TaskEvent::Completed { unit, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(unit).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                unit,
                duration,
                error,
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(unit).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::Watching { unit, patterns } => {
                println!(
                    "  {} {} {}",
                    style("◉").cyan(),
                    output::unit_style().apply_to(unit),
                    style(format!("({} patterns)", patterns.len())).dim()
                );
                if self.verbose {
                    for pattern in patterns {
                        println!("      {}", output::path_style().apply_to(pattern));
                    }
                }
            }
            TaskEvent::Changed { target, path, .. } => {
                println!(
                    "  {} {} {} {}",
                    style("~").yellow(),
                    output::path_style().apply_to(path.display()),
                    style("→").dim(),
                    output::unit_style().apply_to(target)
                );
            }
        }
    }
}
