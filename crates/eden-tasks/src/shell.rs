//! Built-in module running a shell command

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::descriptor::TaskDescriptor;
use crate::error::GraphError;
use crate::task::{RestartHook, Task, TaskContext, TaskResult};

/// Environment variable carrying the resolved watch patterns, one per line
pub const FILES_ENV: &str = "EDEN_TASK_FILES";

/// Runs `sh -c <command>` from the application root.
///
/// Options read from the descriptor:
/// - `command` (required)
/// - `watch`: one glob or a list of globs
/// - `restart_server`: request a dev server restart after each successful run
pub struct ShellTask {
    name: String,
    command: String,
    watch: Option<Vec<String>>,
    cwd: PathBuf,
    restart: Option<Arc<dyn RestartHook>>,
}

impl ShellTask {
    /// Build from a descriptor's options
    pub fn from_descriptor(descriptor: &TaskDescriptor, ctx: &TaskContext) -> Result<Self, GraphError> {
        let invalid = |reason: &str| GraphError::InvalidTask {
            task: descriptor.name.clone(),
            reason: reason.to_string(),
        };

        let command = descriptor
            .options
            .get("command")
            .and_then(|v| v.as_str())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| invalid("missing 'command'"))?
            .to_string();

        let watch = match descriptor.options.get("watch") {
            None => None,
            Some(toml::Value::String(pattern)) => Some(vec![pattern.clone()]),
            Some(toml::Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| invalid("'watch' must contain only strings"))?,
            ),
            Some(_) => return Err(invalid("'watch' must be a string or a list of strings")),
        };

        let restart_server = match descriptor.options.get("restart_server") {
            None => false,
            Some(v) => v
                .as_bool()
                .ok_or_else(|| invalid("'restart_server' must be a boolean"))?,
        };

        Ok(Self {
            name: descriptor.name.clone(),
            command,
            watch,
            cwd: ctx.app_root().to_path_buf(),
            restart: if restart_server { ctx.restart_hook() } else { None },
        })
    }

    /// The command line
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Task for ShellTask {
    async fn run(&self, files: Option<&[String]>) -> TaskResult {
        debug!(task = %self.name, command = %self.command, "running shell task");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(&self.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(files) = files {
            cmd.env(FILES_ENV, files.join("\n"));
        }

        let output = cmd.output().await?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(task = %self.name, "{}", line);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            warn!(task = %self.name, "{}", line);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(format!("command exited with code {}: {}", code, stderr.trim()).into());
        }

        if let Some(hook) = &self.restart {
            hook.request_restart();
        }
        Ok(())
    }

    fn watch(&self) -> Option<Vec<String>> {
        self.watch.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eden_core::BundlePaths;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingHook(AtomicUsize);

    impl RestartHook for CountingHook {
        fn request_restart(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx(root: &std::path::Path) -> TaskContext {
        TaskContext::new(root, BundlePaths::default())
    }

    #[test]
    fn test_requires_command() {
        let descriptor = TaskDescriptor::new("css", "shell");
        let err = ShellTask::from_descriptor(&descriptor, &ctx(std::path::Path::new("/")))
            .err()
            .unwrap();
        assert!(matches!(err, GraphError::InvalidTask { .. }));
    }

    #[test]
    fn test_watch_accepts_one_or_many() {
        let root = std::path::Path::new("/");
        let one = TaskDescriptor::new("css", "shell")
            .with_option("command", "true")
            .with_option("watch", "public/css/*.css");
        let many = TaskDescriptor::new("js", "shell")
            .with_option("command", "true")
            .with_option("watch", vec!["a/*.js", "b/*.js"]);

        let one = ShellTask::from_descriptor(&one, &ctx(root)).unwrap();
        let many = ShellTask::from_descriptor(&many, &ctx(root)).unwrap();
        assert_eq!(one.watch(), Some(vec!["public/css/*.css".to_string()]));
        assert_eq!(many.watch().map(|w| w.len()), Some(2));
    }

    #[test]
    fn test_rejects_non_string_watch() {
        let descriptor = TaskDescriptor::new("css", "shell")
            .with_option("command", "true")
            .with_option("watch", 5);
        assert!(ShellTask::from_descriptor(&descriptor, &ctx(std::path::Path::new("/"))).is_err());
    }

    #[tokio::test]
    async fn test_run_passes_files_and_restarts() {
        let temp = TempDir::new().unwrap();
        let hook = Arc::new(CountingHook::default());
        let context = ctx(temp.path()).with_restart_hook(hook.clone());
        let descriptor = TaskDescriptor::new("list", "shell")
            .with_option("command", format!("printf '%s' \"${}\" > files.txt", FILES_ENV))
            .with_option("restart_server", true);

        let task = ShellTask::from_descriptor(&descriptor, &context).unwrap();
        task.run(Some(&["a/*.js".to_string(), "b/*.js".to_string()]))
            .await
            .unwrap();

        let written = std::fs::read_to_string(temp.path().join("files.txt")).unwrap();
        assert_eq!(written, "a/*.js\nb/*.js");
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_failure_skips_restart() {
        let temp = TempDir::new().unwrap();
        let hook = Arc::new(CountingHook::default());
        let context = ctx(temp.path()).with_restart_hook(hook.clone());
        let descriptor = TaskDescriptor::new("broken", "shell")
            .with_option("command", "echo nope >&2; exit 3")
            .with_option("restart_server", true);

        let task = ShellTask::from_descriptor(&descriptor, &context).unwrap();
        let err = task.run(None).await.unwrap_err();

        assert!(err.to_string().contains("code 3"));
        assert!(err.to_string().contains("nope"));
        assert_eq!(hook.0.load(Ordering::SeqCst), 0);
    }
}
