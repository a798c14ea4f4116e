//! CLI definition and command handling

pub mod commands;
pub mod output;
pub mod project;
pub mod reporter;

use clap::{Parser, Subcommand};

use commands::{InstallCommand, PlanCommand, ServerCommand, StartCommand, WatchCommand};

/// Eden - task runner and cluster supervisor
#[derive(Debug, Parser)]
#[command(name = "eden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    /// Defaults to `server`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every root task once
    Install(InstallCommand),

    /// Install, then re-run tasks when their files change
    Watch(WatchCommand),

    /// Install, start the dev server, then watch
    Server(ServerCommand),

    /// Run the cluster master, or a worker when EDEN_CLUSTER is set
    Start(StartCommand),

    /// Print the task graph without running anything
    Plan(PlanCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(&self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        let runtime = tokio::runtime::Runtime::new()?;
        match &self.command {
            Some(Commands::Install(cmd)) => runtime.block_on(cmd.execute(self)),
            Some(Commands::Watch(cmd)) => runtime.block_on(cmd.execute(self)),
            Some(Commands::Server(cmd)) => runtime.block_on(cmd.execute(self)),
            Some(Commands::Start(cmd)) => runtime.block_on(cmd.execute(self)),
            Some(Commands::Plan(cmd)) => cmd.execute(self),
            None => runtime.block_on(ServerCommand::default().execute(self)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["eden"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["eden", "plan", "--format", "json", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Plan(_))));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn test_start_cluster_list() {
        let cli = Cli::try_parse_from(["eden", "start", "--cluster", "front,admin"]).unwrap();
        match cli.command {
            Some(Commands::Start(cmd)) => assert_eq!(cmd.cluster, vec!["front", "admin"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
