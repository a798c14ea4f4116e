//! Launching child processes and observing their exit
//!
//! A [`ProcessHandle`] is the only view the supervisor and the dev server
//! coordinator have of a child: a termination request plus an exit
//! notification that every clone of the handle observes exactly once.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProcessError, Result};

/// Environment handed to a child process, fixed at launch time
pub type Environment = BTreeMap<String, String>;

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Exited on its own with a status code
    Exited(i32),
    /// Terminated by a signal it was not asked to receive
    Signalled,
    /// Terminated after a kill request
    Killed,
    /// The exit could not be observed
    Lost,
}

impl std::fmt::Display for ExitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitState::Exited(code) => write!(f, "exited with code {}", code),
            ExitState::Signalled => write!(f, "terminated by signal"),
            ExitState::Killed => write!(f, "killed"),
            ExitState::Lost => write!(f, "lost"),
        }
    }
}

impl From<std::io::Result<ExitStatus>> for ExitState {
    fn from(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => match status.code() {
                Some(code) => ExitState::Exited(code),
                None => ExitState::Signalled,
            },
            Err(_) => ExitState::Lost,
        }
    }
}

/// Cloneable handle to one launched process
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    role: String,
    pid: Option<u32>,
    kill: CancellationToken,
    exit: watch::Receiver<Option<ExitState>>,
}

/// Launcher-side half of a handle: observes kill requests, publishes the exit
#[derive(Debug, Clone)]
pub struct ExitNotifier {
    kill: CancellationToken,
    exit: Arc<watch::Sender<Option<ExitState>>>,
}

impl ProcessHandle {
    /// Create a handle and the notifier that completes it
    pub fn new(role: impl Into<String>, pid: Option<u32>) -> (Self, ExitNotifier) {
        let kill = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let handle = Self {
            role: role.into(),
            pid,
            kill: kill.clone(),
            exit: rx,
        };
        let notifier = ExitNotifier {
            kill,
            exit: Arc::new(tx),
        };
        (handle, notifier)
    }

    /// Role the process was launched for
    pub fn role(&self) -> &str {
        &self.role
    }

    /// OS process id, if known
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit state, if the process has exited
    pub fn exit_state(&self) -> Option<ExitState> {
        *self.exit.borrow()
    }

    /// Whether the process is still running
    pub fn is_running(&self) -> bool {
        self.exit_state().is_none()
    }

    /// Request termination without waiting
    pub fn kill(&self) {
        self.kill.cancel();
    }

    /// Wait for the exit notification.
    ///
    /// Returns immediately when the process already exited. A notifier
    /// dropped without publishing yields [`ExitState::Lost`].
    pub async fn wait(&self) -> ExitState {
        let mut exit = self.exit.clone();
        loop {
            if let Some(state) = *exit.borrow_and_update() {
                return state;
            }
            if exit.changed().await.is_err() {
                return (*exit.borrow()).unwrap_or(ExitState::Lost);
            }
        }
    }

    /// Request termination and wait for the exit
    pub async fn terminate(&self) -> ExitState {
        self.kill();
        self.wait().await
    }
}

impl ExitNotifier {
    /// Wait until termination is requested
    pub async fn kill_requested(&self) {
        self.kill.cancelled().await;
    }

    /// Whether termination was requested
    pub fn is_kill_requested(&self) -> bool {
        self.kill.is_cancelled()
    }

    /// Publish the exit; only the first call has any effect
    pub fn notify(&self, state: ExitState) {
        self.exit.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(state);
            true
        });
    }
}

/// Starts processes for a role with a given environment
pub trait Launcher: Send + Sync {
    /// Launch one process
    fn launch(&self, role: &str, env: &Environment) -> Result<ProcessHandle>;
}

/// Time a stopping process group gets between SIGTERM and SIGKILL
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Launches an OS command with a fully specified environment.
///
/// On unix every child leads its own process group. A kill request sends
/// SIGTERM to the whole group, then SIGKILL once the grace period runs out,
/// so grandchildren never outlive the handle.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    grace: Duration,
}

impl CommandLauncher {
    /// Launch `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            grace: DEFAULT_GRACE,
        }
    }

    /// Launch the running executable again
    pub fn current_exe() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Set the arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set how long a stopping process may take before it is killed
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn command(&self, env: &Environment) -> Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        Command::from(cmd)
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, role: &str, env: &Environment) -> Result<ProcessHandle> {
        let mut child = self
            .command(env)
            .spawn()
            .map_err(|source| ProcessError::Launch {
                role: role.to_string(),
                source,
            })?;

        let pid = child.id();
        let (handle, notifier) = ProcessHandle::new(role, pid);
        info!(role = %role, pid = ?pid, "process launched");

        let role = role.to_string();
        let grace = self.grace;
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(ExitState::from(status)),
                _ = notifier.kill_requested() => None,
            };
            let state = match exited {
                Some(state) => state,
                None => stop(&mut child, pid, grace).await,
            };
            // members left behind by a leader that is already gone
            if let Some(pid) = pid {
                signal_group(pid, Signal::Kill);
            }
            debug!(role = %role, state = %state, "process exited");
            notifier.notify(state);
        });

        Ok(handle)
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Stop a child after a kill request: SIGTERM to its group, SIGKILL after `grace`
async fn stop(child: &mut Child, pid: Option<u32>, grace: Duration) -> ExitState {
    if let Some(pid) = pid.filter(|_| cfg!(unix)) {
        signal_group(pid, Signal::Term);
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(_)) => return ExitState::Killed,
            Ok(Err(_)) => return ExitState::Lost,
            Err(_) => {
                warn!(pid = pid, grace = ?grace, "process ignored SIGTERM, killing");
                signal_group(pid, Signal::Kill);
            }
        }
    }

    let _ = child.start_kill();
    match child.wait().await {
        Ok(_) => ExitState::Killed,
        Err(_) => ExitState::Lost,
    }
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: Signal) {
    let signal = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a group that is already gone yields ESRCH
    unsafe {
        libc::kill(-pgid, signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: u32, _signal: Signal) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_path() -> Environment {
        std::env::vars().filter(|(k, _)| k == "PATH").collect()
    }

    #[tokio::test]
    async fn test_exit_is_broadcast_to_every_clone() {
        let (handle, notifier) = ProcessHandle::new("front", Some(7));
        let other = handle.clone();

        let waiter = tokio::spawn(async move { other.wait().await });
        assert!(handle.is_running());

        notifier.notify(ExitState::Exited(1));
        notifier.notify(ExitState::Killed);

        assert_eq!(waiter.await.unwrap(), ExitState::Exited(1));
        assert_eq!(handle.wait().await, ExitState::Exited(1));
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_dropped_notifier_is_lost() {
        let (handle, notifier) = ProcessHandle::new("back", None);
        drop(notifier);
        assert_eq!(handle.wait().await, ExitState::Lost);
    }

    #[tokio::test]
    async fn test_kill_request_reaches_notifier() {
        let (handle, notifier) = ProcessHandle::new("front", None);
        tokio::spawn(async move {
            notifier.kill_requested().await;
            notifier.notify(ExitState::Killed);
        });

        assert_eq!(handle.terminate().await, ExitState::Killed);
    }

    #[tokio::test]
    async fn test_command_launcher_reports_exit_code() {
        let launcher = CommandLauncher::new("/bin/sh").with_args(["-c", "exit 4"]);
        let handle = launcher.launch("front", &env_with_path()).unwrap();

        assert!(handle.pid().is_some());
        assert_eq!(handle.wait().await, ExitState::Exited(4));
    }

    #[tokio::test]
    async fn test_command_launcher_passes_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = CommandLauncher::new("/bin/sh")
            .with_args(["-c", "printf '%s' \"$EDEN_CLUSTER\" > role.txt"])
            .with_cwd(dir.path());
        let mut env = env_with_path();
        env.insert("EDEN_CLUSTER".to_string(), "back".to_string());

        let handle = launcher.launch("back", &env).unwrap();
        assert_eq!(handle.wait().await, ExitState::Exited(0));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("role.txt")).unwrap(),
            "back"
        );
    }

    #[tokio::test]
    async fn test_command_launcher_kill() {
        let launcher = CommandLauncher::new("/bin/sh").with_args(["-c", "exec sleep 30"]);
        let handle = launcher.launch("front", &env_with_path()).unwrap();

        let state = tokio::time::timeout(Duration::from_secs(5), handle.terminate())
            .await
            .unwrap();
        assert_eq!(state, ExitState::Killed);
    }

    /// Running and not a zombie
    #[cfg(target_os = "linux")]
    fn is_alive(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat.contains(") Z"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_terminate_stops_grandchildren() {
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = CommandLauncher::new("/bin/sh")
            .with_args(["-c", "sleep 300 & echo $! > child.pid; wait"])
            .with_cwd(dir.path())
            .with_grace(Duration::from_secs(2));
        let handle = launcher.launch("server", &env_with_path()).unwrap();

        let pid_file = dir.path().join("child.pid");
        let grandchild = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(pid) = std::fs::read_to_string(&pid_file) {
                    if let Ok(pid) = pid.trim().parse::<u32>() {
                        return pid;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(is_alive(grandchild));

        let state = tokio::time::timeout(Duration::from_secs(5), handle.terminate())
            .await
            .unwrap();
        assert_eq!(state, ExitState::Killed);

        let gone = tokio::time::timeout(Duration::from_secs(5), async {
            while is_alive(grandchild) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(gone.is_ok(), "grandchild {} outlived terminate", grandchild);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_sigterm_ignored_falls_back_to_kill() {
        let launcher = CommandLauncher::new("/bin/sh")
            .with_args(["-c", "trap '' TERM; while :; do sleep 1; done"])
            .with_grace(Duration::from_millis(200));
        let handle = launcher.launch("front", &env_with_path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = tokio::time::timeout(Duration::from_secs(5), handle.terminate())
            .await
            .unwrap();
        assert_eq!(state, ExitState::Killed);
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let launcher = CommandLauncher::new("/definitely/not/a/program");
        let err = launcher.launch("front", &Environment::new()).unwrap_err();
        assert!(matches!(err, ProcessError::Launch { .. }));
    }
}
