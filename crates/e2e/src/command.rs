//! Shell command execution with timeouts
//!
//! Every external collaborator (package manager, git, the browser install)
//! goes through [`CommandRunner`]. Failures of any kind come back as a
//! failed [`CommandResult`]; nothing here returns an error to the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

/// Marker placed in `stderr` when a command exceeds its time budget
pub const TIMEOUT_MARKER: &str = "Timeout";

/// A shell command together with its time budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Outcome of a single command invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CommandResult {
    fn timeout(duration_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: TIMEOUT_MARKER.to_string(),
            exit_code: None,
            duration_ms,
            timed_out: true,
        }
    }

    fn launch_failure(reason: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: reason,
            exit_code: None,
            duration_ms,
            timed_out: false,
        }
    }

    /// stdout followed by stderr, for scanning tool output that may land on either
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Short human-readable reason for a failure
    pub fn failure_reason(&self) -> String {
        if self.timed_out {
            return TIMEOUT_MARKER.to_string();
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs shell commands relative to a fixed project root
#[derive(Debug, Clone)]
pub struct CommandRunner {
    root: PathBuf,
}

impl CommandRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory every relative operation resolves against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a possibly-relative path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub async fn run_spec(&self, spec: &CommandSpec) -> CommandResult {
        self.run(&spec.command, None, spec.timeout()).await
    }

    /// Run `command` through `sh -c` in `cwd` (default: the project root).
    ///
    /// A command that outlives `timeout` is killed along with its process
    /// group and reported with `stderr == "Timeout"`.
    pub async fn run(&self, command: &str, cwd: Option<&Path>, timeout: Duration) -> CommandResult {
        let start = Instant::now();
        let dir = cwd.unwrap_or(self.root.as_path());
        debug!(command, dir = %dir.display(), "Running command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch `{}`: {}", command, e);
                return CommandResult::launch_failure(e.to_string(), elapsed_ms(start));
            }
        };
        let pid = child.id();

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandResult {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    exit_code: output.status.code(),
                    duration_ms: elapsed_ms(start),
                    timed_out: false,
                };
                debug!(
                    command,
                    success = result.success,
                    duration_ms = result.duration_ms,
                    "Command finished"
                );
                result
            }
            Ok(Err(e)) => {
                warn!("Failed waiting on `{}`: {}", command, e);
                CommandResult::launch_failure(e.to_string(), elapsed_ms(start))
            }
            Err(_) => {
                warn!("`{}` timed out after {}s", command, timeout.as_secs_f64());
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                CommandResult::timeout(elapsed_ms(start))
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// SIGKILL everything in the group led by `pid`
pub(crate) fn kill_process_group(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = pid;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> CommandRunner {
        CommandRunner::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_captures_stdout_on_success() {
        let result = runner().run("echo hello", None, Duration::from_secs(10)).await;
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let result = runner()
            .run("echo broken >&2; exit 3", None, Duration::from_secs(10))
            .await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.failure_reason(), "broken");
    }

    #[tokio::test]
    async fn test_timeout_is_reported_not_raised() {
        let result = runner().run("sleep 5", None, Duration::from_millis(200)).await;
        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(result.stderr, TIMEOUT_MARKER);
        assert!(result.duration_ms < 5000);
    }

    #[tokio::test]
    async fn test_missing_working_directory_becomes_failed_result() {
        let missing = std::env::temp_dir().join("dragonfly-e2e-no-such-dir-7c1f");
        let result = runner()
            .run("true", Some(&missing), Duration::from_secs(10))
            .await;
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_fails() {
        let result = runner()
            .run("dragonfly-definitely-not-a-command", None, Duration::from_secs(10))
            .await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(127));
    }

    #[tokio::test]
    async fn test_runs_in_project_root_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(dir.path());
        let result = runner.run("touch marker", None, Duration::from_secs(10)).await;
        assert!(result.success);
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let runner = CommandRunner::new("/srv/app");
        assert_eq!(runner.resolve(Path::new("/tmp/x.png")), PathBuf::from("/tmp/x.png"));
        assert_eq!(runner.resolve(Path::new("package.json")), PathBuf::from("/srv/app/package.json"));
    }
}
