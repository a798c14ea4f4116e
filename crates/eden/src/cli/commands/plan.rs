//! Plan command - print the task graph

use clap::Args;

use crate::cli::project::Project;
use crate::cli::{output, Cli, OutputFormat};

/// Print the task graph without running anything
#[derive(Debug, Default, Args)]
pub struct PlanCommand {
    /// Also list the bundle search paths
    #[arg(long)]
    pub bundles: bool,
}

impl PlanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::load()?;
        let graph = project.build_graph(None)?;

        if cli.format == OutputFormat::Json {
            let plan = serde_json::json!({
                "root": project.root,
                "config": project.config_path,
                "bundles": project.bundles.roots(),
                "install": graph.installers(),
                "tasks": graph.registrations(),
                "watch": graph.watchers(),
            });
            println!("{}", serde_json::to_string_pretty(&plan)?);
            return Ok(());
        }

        println!("{}", output::header(&format!("Task graph ({} tasks)", graph.len())));
        println!("{}", output::key_value("root", &project.root.display().to_string()));
        if let Some(path) = &project.config_path {
            println!("{}", output::key_value("config", &path.display().to_string()));
        }
        if self.bundles || cli.verbose {
            for root in project.bundles.roots() {
                println!("{}", output::key_value("bundle", root));
            }
        }
        println!();
        print!("{}", graph.plan());
        Ok(())
    }
}
