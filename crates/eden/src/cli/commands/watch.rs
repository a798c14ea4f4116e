//! Watch command - install, then re-run tasks on file changes

use clap::Args;

use eden_process::wait_for_shutdown_signal;
use eden_tasks::{Engine, TaskGraph, WATCH};

use super::install::run_install;
use crate::cli::project::Project;
use crate::cli::{output, reporter, Cli};

/// Install, then re-run tasks when their files change
#[derive(Debug, Default, Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::load()?;
        let graph = project.build_graph(None)?;
        let engine = project.engine(&graph, reporter::for_cli(cli));

        run_install(&engine, graph.installers().len(), cli).await?;
        run_watch(&engine, &graph, cli).await
    }
}

/// Run the `watch` group until it stops or a termination signal arrives
pub async fn run_watch(engine: &Engine, graph: &TaskGraph, cli: &Cli) -> anyhow::Result<()> {
    let watchers = graph.watchers();
    if watchers.is_empty() {
        if !cli.quiet {
            output::warning("No task watches any files");
        }
        return Ok(());
    }

    if !cli.quiet {
        output::info(&format!("Watching {} units (ctrl-c to stop)", watchers.len()));
    }

    tokio::select! {
        result = engine.run(WATCH) => result?,
        signal = wait_for_shutdown_signal() => signal?,
    }
    Ok(())
}
