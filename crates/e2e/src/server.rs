//! Dev server management - spawning, readiness and teardown

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::command::kill_process_group;
use crate::error::{E2eError, E2eResult};

/// Configuration for the background dev server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Shell command that starts the server
    pub command: String,

    /// URL the application is served on
    pub url: String,

    pub readiness: Readiness,

    /// How long SIGTERM gets before SIGKILL
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "pnpm dev".to_string(),
            url: "http://localhost:3000".to_string(),
            readiness: Readiness::default(),
            shutdown_grace_secs: 5,
        }
    }
}

/// How to decide the server is up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Readiness {
    /// Poll the URL until anything answers
    Poll { timeout_secs: u64, interval_ms: u64 },
    /// Blind grace period
    Fixed { wait_secs: u64 },
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Poll {
            timeout_secs: 30,
            interval_ms: 250,
        }
    }
}

/// Handle to a running dev server process.
///
/// The process leads its own process group so that everything the package
/// manager forks is torn down with it. Call [`ServerHandle::shutdown`];
/// dropping the handle without it kills the group outright.
pub struct ServerHandle {
    child: Option<Child>,
    pid: u32,
    url: String,
    grace: Duration,
}

impl ServerHandle {
    /// Spawn the dev server detached from our stdio
    pub async fn spawn(config: &ServerConfig, root: &Path) -> E2eResult<Self> {
        info!("Starting dev server: {}", config.command);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&config.command)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn `{}`: {}", config.command, e))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| E2eError::ServerStartup("process exited immediately".to_string()))?;

        debug!(pid, "Dev server spawned");
        Ok(Self {
            child: Some(child),
            pid,
            url: config.url.clone(),
            grace: Duration::from_secs(config.shutdown_grace_secs),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Block until the server is usable according to `readiness`
    pub async fn wait_until_ready(&mut self, readiness: &Readiness) -> E2eResult<()> {
        match readiness {
            Readiness::Fixed { wait_secs } => {
                info!("Waiting for server to start ({}s)...", wait_secs);
                sleep(Duration::from_secs(*wait_secs)).await;
                self.ensure_running()
            }
            Readiness::Poll {
                timeout_secs,
                interval_ms,
            } => {
                self.poll_until_ready(
                    Duration::from_secs(*timeout_secs),
                    Duration::from_millis(*interval_ms),
                )
                .await
            }
        }
    }

    async fn poll_until_ready(&mut self, bound: Duration, interval: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < bound {
            attempts += 1;
            self.ensure_running()?;

            match client.get(&self.url).send().await {
                Ok(resp) => {
                    info!(
                        "Server answered {} after {} ms",
                        resp.status(),
                        start.elapsed().as_millis()
                    );
                    return Ok(());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to accept connections...", self.url);
                    }
                    // Connection refused is expected while the server is starting
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(interval).await;
        }

        Err(E2eError::ServerNotReady {
            url: self.url.clone(),
            attempts,
        })
    }

    fn ensure_running(&mut self) -> E2eResult<()> {
        if let Some(child) = self.child.as_mut() {
            if let Some(status) = child.try_wait()? {
                return Err(E2eError::ServerExited(status.to_string()));
            }
        }
        Ok(())
    }

    /// Stop the server: SIGTERM, wait out the grace period, then SIGKILL.
    pub async fn shutdown(mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        info!("Stopping dev server (pid: {})", self.pid);

        terminate_process_group(self.pid);

        match timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Dev server exited"),
            Ok(Err(e)) => {
                warn!("Failed waiting for dev server: {}", e);
                let _ = child.kill().await;
            }
            Err(_) => {
                warn!(
                    "Dev server ignored SIGTERM for {}s; killing",
                    self.grace.as_secs()
                );
                let _ = child.kill().await;
            }
        }

        // Anything the package manager forked that outlived the leader
        kill_process_group(self.pid);
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!("Dev server handle dropped without shutdown; killing pid {}", self.pid);
            kill_process_group(self.pid);
            let _ = child.start_kill();
        }
    }
}

fn terminate_process_group(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!("SIGTERM to process group {} failed: {}", pid, e);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn process_alive(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    fn config(command: &str, url: String, readiness: Readiness) -> ServerConfig {
        ServerConfig {
            command: command.to_string(),
            url,
            readiness,
            shutdown_grace_secs: 5,
        }
    }

    /// Answers every connection with an empty 200
    async fn serve_ok() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });
        format!("http://{}", addr)
    }

    fn unused_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        format!("http://127.0.0.1:{}", port)
    }

    #[tokio::test]
    async fn test_shutdown_terminates_process() {
        let cfg = config("sleep 30", unused_url(), Readiness::Fixed { wait_secs: 0 });
        let server = ServerHandle::spawn(&cfg, &std::env::temp_dir()).await.unwrap();
        let pid = server.pid();
        assert!(process_alive(pid));

        server.shutdown().await.unwrap();
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn test_sigterm_resistant_server_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(
            "trap '' TERM; touch ready; while true; do sleep 0.1; done",
            unused_url(),
            Readiness::Fixed { wait_secs: 0 },
        );
        cfg.shutdown_grace_secs = 1;
        let server = ServerHandle::spawn(&cfg, dir.path()).await.unwrap();
        let pid = server.pid();

        // SIGTERM must not land before the trap is installed
        let deadline = Instant::now() + Duration::from_secs(5);
        while !dir.path().join("ready").exists() {
            assert!(Instant::now() < deadline, "server never installed its trap");
            sleep(Duration::from_millis(20)).await;
        }

        let start = Instant::now();
        server.shutdown().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn test_poll_succeeds_once_url_answers() {
        let url = serve_ok().await;
        let readiness = Readiness::Poll {
            timeout_secs: 5,
            interval_ms: 50,
        };
        let cfg = config("sleep 30", url, readiness.clone());
        let mut server = ServerHandle::spawn(&cfg, &std::env::temp_dir()).await.unwrap();

        let ready = server.wait_until_ready(&readiness).await;
        server.shutdown().await.unwrap();
        assert!(ready.is_ok());
    }

    #[tokio::test]
    async fn test_poll_times_out_when_nothing_listens() {
        let readiness = Readiness::Poll {
            timeout_secs: 1,
            interval_ms: 50,
        };
        let cfg = config("sleep 30", unused_url(), readiness.clone());
        let mut server = ServerHandle::spawn(&cfg, &std::env::temp_dir()).await.unwrap();

        let err = server.wait_until_ready(&readiness).await.unwrap_err();
        server.shutdown().await.unwrap();
        assert!(matches!(err, E2eError::ServerNotReady { attempts, .. } if attempts > 1));
    }

    #[tokio::test]
    async fn test_poll_fails_fast_when_server_exits() {
        let readiness = Readiness::Poll {
            timeout_secs: 30,
            interval_ms: 50,
        };
        let cfg = config("exit 3", unused_url(), readiness.clone());
        let mut server = ServerHandle::spawn(&cfg, &std::env::temp_dir()).await.unwrap();

        let start = Instant::now();
        let err = server.wait_until_ready(&readiness).await.unwrap_err();
        server.shutdown().await.unwrap();
        assert!(matches!(err, E2eError::ServerExited(_)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
