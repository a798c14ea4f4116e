//! Install command - run every root task once

use std::time::Instant;

use clap::Args;

use eden_tasks::{Engine, INSTALL};

use crate::cli::project::Project;
use crate::cli::{output, reporter, Cli, OutputFormat};

/// Run every root task once
#[derive(Debug, Default, Args)]
pub struct InstallCommand {}

impl InstallCommand {
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::load()?;
        let graph = project.build_graph(None)?;
        let engine = project.engine(&graph, reporter::for_cli(cli));

        run_install(&engine, graph.installers().len(), cli).await
    }
}

/// Run the `install` series and report how it went
pub async fn run_install(engine: &Engine, tasks: usize, cli: &Cli) -> anyhow::Result<()> {
    if !cli.quiet && cli.format == OutputFormat::Text {
        output::info(&format!(
            "Installing {} task{}",
            tasks,
            if tasks == 1 { "" } else { "s" }
        ));
    }

    let start = Instant::now();
    engine.run(INSTALL).await?;

    if cli.format == OutputFormat::Json {
        let summary = serde_json::json!({
            "unit": INSTALL,
            "tasks": tasks,
            "duration_ms": start.elapsed().as_millis(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !cli.quiet {
        output::success(&format!(
            "Install finished in {:.1}s",
            start.elapsed().as_secs_f64()
        ));
    }
    Ok(())
}
