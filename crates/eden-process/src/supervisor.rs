//! Role-based worker supervision
//!
//! The cluster master launches one worker per role and relaunches a role as
//! soon as its worker exits. There is no backoff and no restart ceiling; a
//! crash loop is only logged.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use eden_core::{ROLES_ENV, ROLE_ENV};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::launcher::{Environment, ExitState, Launcher, ProcessHandle};

/// A launched worker
#[derive(Debug, Clone)]
pub struct Worker {
    /// Handle to the worker process
    pub handle: ProcessHandle,
    /// Environment the worker was launched with
    pub env: Environment,
}

#[derive(Debug)]
struct ExitNotice {
    role: String,
    state: ExitState,
}

/// Build a worker's environment.
///
/// CLI-derived variables are overlaid by inherited ones, the multi-role
/// selector is removed and the single-role selector set to `role`.
pub fn worker_environment(cli: &Environment, inherited: &Environment, role: &str) -> Environment {
    let mut env = cli.clone();
    env.extend(inherited.iter().map(|(k, v)| (k.clone(), v.clone())));
    env.remove(ROLES_ENV);
    env.insert(ROLE_ENV.to_string(), role.to_string());
    env
}

/// Owns every worker process and relaunches them on exit
pub struct Supervisor {
    launcher: Arc<dyn Launcher>,
    cli_env: Environment,
    inherited: Environment,
    workers: HashMap<String, Worker>,
    exits_tx: mpsc::UnboundedSender<ExitNotice>,
    exits_rx: mpsc::UnboundedReceiver<ExitNotice>,
}

impl Supervisor {
    /// Create a supervisor inheriting the current process environment
    pub fn new(launcher: Arc<dyn Launcher>, cli_env: Environment) -> Self {
        let (exits_tx, exits_rx) = mpsc::unbounded_channel();
        Self {
            launcher,
            cli_env,
            inherited: std::env::vars().collect(),
            workers: HashMap::new(),
            exits_tx,
            exits_rx,
        }
    }

    /// Replace the inherited environment
    pub fn with_inherited(mut self, inherited: Environment) -> Self {
        self.inherited = inherited;
        self
    }

    /// Launch a worker for `role`, replacing any handle recorded for it
    pub fn spawn(&mut self, role: &str) -> Result<&Worker> {
        let env = worker_environment(&self.cli_env, &self.inherited, role);
        let handle = self.launcher.launch(role, &env)?;
        info!(role = %role, pid = ?handle.pid(), "worker started");

        let exits = self.exits_tx.clone();
        let watched = handle.clone();
        tokio::spawn(async move {
            let state = watched.wait().await;
            let _ = exits.send(ExitNotice {
                role: watched.role().to_string(),
                state,
            });
        });

        self.workers.insert(role.to_string(), Worker { handle, env });
        Ok(&self.workers[role])
    }

    /// The worker currently recorded for a role
    pub fn worker(&self, role: &str) -> Option<&Worker> {
        self.workers.get(role)
    }

    /// Roles with a recorded worker, sorted
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.workers.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Wait for the next worker exit and relaunch its role.
    ///
    /// Returns the role and how its worker ended. A failed relaunch is logged;
    /// the role then stays down.
    pub async fn handle_next_exit(&mut self) -> Option<(String, ExitState)> {
        let notice = self.exits_rx.recv().await?;
        warn!(role = %notice.role, state = %notice.state, "worker exited, respawning");

        if let Err(e) = self.spawn(&notice.role) {
            error!(role = %notice.role, error = %e, "failed to respawn worker");
        }
        Some((notice.role, notice.state))
    }

    /// Launch every role and supervise until `shutdown` completes, then
    /// terminate all workers.
    ///
    /// When a role fails to launch, the workers already started are
    /// terminated before the error is returned.
    pub async fn run_until<F>(&mut self, roles: &[String], shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        for role in roles {
            if let Err(e) = self.spawn(role).map(|_| ()) {
                error!(role = %role, error = %e, "failed to start worker, stopping cluster");
                self.shutdown().await;
                return Err(e);
            }
        }
        info!(roles = ?roles, "cluster master running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                exit = self.handle_next_exit() => {
                    if exit.is_none() {
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Launch every role and supervise until a termination signal arrives
    pub async fn run(&mut self, roles: &[String]) -> Result<()> {
        let signal = async {
            if let Err(e) = wait_for_shutdown_signal().await {
                error!(error = %e, "failed to listen for shutdown signals");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(roles, signal).await
    }

    /// Terminate every worker and wait for them to exit
    pub async fn shutdown(&mut self) {
        info!(workers = self.workers.len(), "stopping workers");
        let workers: Vec<Worker> = self.workers.drain().map(|(_, w)| w).collect();
        join_all(workers.iter().map(|w| w.handle.terminate())).await;
    }
}

/// Complete when the process receives an interrupt or termination signal
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = sigterm.recv() => {},
    }
    Ok(())
}

/// Complete when the process receives an interrupt
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
