//! Server command - install, start the dev server, then watch

use std::sync::Arc;

use clap::Args;
use tracing::warn;

use eden_process::{CommandLauncher, DevServer, DEFAULT_GRACE};
use eden_tasks::RestartHook;

use super::install::run_install;
use super::watch::run_watch;
use crate::cli::project::Project;
use crate::cli::{output, reporter, Cli};

/// Install, start the dev server, then watch
#[derive(Debug, Default, Args)]
pub struct ServerCommand {
    /// Roles the dev server's cluster master launches (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub cluster: Vec<String>,
}

impl ServerCommand {
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let project = Project::load()?;

        let launcher = CommandLauncher::current_exe()?
            .with_args(self.start_args())
            .with_cwd(&project.root)
            // the cluster master stops its own workers first
            .with_grace(DEFAULT_GRACE * 2);
        let server = DevServer::new(Arc::new(launcher), std::env::vars().collect());

        let hook: Arc<dyn RestartHook> = Arc::new(DevRestart::new(server.clone()));
        let graph = project.build_graph(Some(hook))?;
        let engine = project.engine(&graph, reporter::for_cli(cli));

        run_install(&engine, graph.installers().len(), cli).await?;

        server.restart(true).await?;
        if !cli.quiet {
            match server.current_pid() {
                Some(pid) => output::success(&format!("Dev server started (pid {})", pid)),
                None => output::success("Dev server started"),
            }
        }

        let result = run_watch(&engine, &graph, cli).await;
        server.shutdown().await;
        result
    }

    /// Arguments for the `start` invocation the dev server runs
    fn start_args(&self) -> Vec<String> {
        let mut args = vec!["start".to_string()];
        if !self.cluster.is_empty() {
            args.push("--cluster".to_string());
            args.push(self.cluster.join(","));
        }
        args
    }
}

/// Lets tasks request a dev server restart without waiting for it
struct DevRestart {
    server: DevServer,
}

impl DevRestart {
    fn new(server: DevServer) -> Self {
        Self { server }
    }
}

impl RestartHook for DevRestart {
    fn request_restart(&self) {
        let server = self.server.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = server.restart(false).await {
                        warn!(error = %e, "dev server restart failed");
                    }
                });
            }
            Err(_) => warn!("dev server restart requested outside the runtime"),
        }
    }
}
