//! Start command - cluster master or role worker

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use eden_core::ROLE_ENV;
use eden_process::{
    BootstrapRegistry, CommandBootstrap, CommandLauncher, Environment, Supervisor,
};

use crate::cli::project::Project;
use crate::cli::{output, Cli};

/// Run the cluster master, or a worker when EDEN_CLUSTER is set
#[derive(Debug, Default, Args)]
pub struct StartCommand {
    /// Roles to launch (comma separated); defaults to `cluster.roles`
    #[arg(long, env = "EDEN_CLUSTERS", value_delimiter = ',')]
    pub cluster: Vec<String>,

    /// Extra variable for every worker (KEY=VALUE, repeatable)
    #[arg(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,
}

impl StartCommand {
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::load()?;

        match std::env::var(ROLE_ENV) {
            Ok(role) if !role.is_empty() => self.run_worker(&project, &role).await,
            _ => self.run_master(&project, cli).await,
        }
    }

    async fn run_master(&self, project: &Project, cli: &Cli) -> anyhow::Result<()> {
        let roles = self.roles(project);
        if !cli.quiet {
            output::info(&format!("Starting cluster: {}", roles.join(", ")));
        }

        let launcher = CommandLauncher::current_exe()?
            .with_args(["start"])
            .with_cwd(&project.root);
        let cli_env: Environment = self.env.iter().cloned().collect();

        let mut supervisor = Supervisor::new(Arc::new(launcher), cli_env);
        supervisor.run(&roles).await?;
        info!("cluster master stopped");
        Ok(())
    }

    async fn run_worker(&self, project: &Project, role: &str) -> anyhow::Result<()> {
        debug!(role = %role, "starting worker");

        let mut registry = BootstrapRegistry::new();
        for (name, config) in &project.config.roles {
            if let Some(command) = &config.command {
                let bootstrap = CommandBootstrap::new(command.clone())
                    .with_env(config.env.clone())
                    .with_cwd(&project.root);
                registry.register(name.clone(), Arc::new(bootstrap));
            }
        }

        registry
            .run(role)
            .await
            .with_context(|| format!("Worker '{}' stopped", role))
    }

    /// Roles from the command line, else from configuration
    fn roles(&self, project: &Project) -> Vec<String> {
        let roles: Vec<String> = self
            .cluster
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if roles.is_empty() {
            project.config.cluster.roles.clone()
        } else {
            roles
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eden_core::{BundlePaths, Config};

    fn project() -> Project {
        Project {
            root: std::path::PathBuf::from("/srv/app"),
            config: Config::default(),
            config_path: None,
            bundles: BundlePaths::default(),
        }
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("PORT=4000").unwrap(),
            ("PORT".to_string(), "4000".to_string())
        );
        assert_eq!(
            parse_key_value("URL=a=b").unwrap(),
            ("URL".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("PORT").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn test_roles_default_to_config() {
        let cmd = StartCommand::default();
        assert_eq!(cmd.roles(&project()), vec!["front", "back"]);
    }

    #[test]
    fn test_cli_roles_win() {
        let cmd = StartCommand {
            cluster: vec!["admin".to_string(), " ".to_string()],
            env: Vec::new(),
        };
        assert_eq!(cmd.roles(&project()), vec!["admin"]);
    }
}
