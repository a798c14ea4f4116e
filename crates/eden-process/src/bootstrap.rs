//! Role bootstraps run inside worker processes

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ProcessError, Result};

/// Entry point a worker runs for its role
#[async_trait]
pub trait Bootstrap: Send + Sync {
    /// Run the role until it finishes
    async fn run(&self, role: &str) -> Result<()>;
}

/// Runs a configured shell command in the foreground
#[derive(Debug, Clone)]
pub struct CommandBootstrap {
    command: String,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl CommandBootstrap {
    /// Bootstrap running `sh -c <command>`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Extra variables for the command
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Working directory for the command
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

#[async_trait]
impl Bootstrap for CommandBootstrap {
    async fn run(&self, role: &str) -> Result<()> {
        info!(role = %role, command = %self.command, "bootstrapping worker");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command).envs(&self.env).kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let status = cmd
            .status()
            .await
            .map_err(|source| ProcessError::Launch {
                role: role.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Bootstrap {
                role: role.to_string(),
                reason: match status.code() {
                    Some(code) => format!("command exited with code {}", code),
                    None => "command terminated by signal".to_string(),
                },
            })
        }
    }
}

/// Role name to bootstrap mapping
#[derive(Default)]
pub struct BootstrapRegistry {
    roles: HashMap<String, Arc<dyn Bootstrap>>,
}

impl BootstrapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role's bootstrap, replacing any previous one
    pub fn register(&mut self, role: impl Into<String>, bootstrap: Arc<dyn Bootstrap>) {
        let role = role.into();
        debug!(role = %role, "registering bootstrap");
        self.roles.insert(role, bootstrap);
    }

    /// Whether a role has a bootstrap
    pub fn contains(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// Registered roles, sorted
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Run the bootstrap for `role`
    pub async fn run(&self, role: &str) -> Result<()> {
        let bootstrap = self
            .roles
            .get(role)
            .ok_or_else(|| ProcessError::UnknownRole(role.to_string()))?;
        bootstrap.run(role).await
    }
}
