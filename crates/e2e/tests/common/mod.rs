//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dragonfly_e2e::browser::{BrowserDriver, PageProbe, ProbeReport};
use dragonfly_e2e::command::CommandSpec;
use dragonfly_e2e::server::Readiness;
use dragonfly_e2e::{E2eResult, HarnessConfig};

/// Browser stand-in that returns a canned report and records what it was asked
pub struct MockDriver {
    pub available: bool,
    pub report: ProbeReport,
    pub probes: AtomicUsize,
    pub last_url: Mutex<Option<String>>,
}

impl MockDriver {
    pub fn new(report: ProbeReport) -> Self {
        Self {
            available: true,
            report,
            probes: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(ProbeReport::default())
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn probe(&self, probe: &PageProbe) -> E2eResult<ProbeReport> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_url.lock() {
            *last = Some(probe.url.clone());
        }
        Ok(self.report.clone())
    }
}

/// Lay down the files a healthy DragonFly checkout has
pub fn scaffold_project(root: &Path) {
    for file in ["package.json", "server/_core/index.ts", "client/src/main.tsx", ".env"] {
        let path = root.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }
    fs::create_dir_all(root.join("node_modules")).unwrap();
}

/// Config rooted at `root` whose every command is a cheap shell builtin.
///
/// The dev server records its pid in `server.pid` and then sleeps.
pub fn harness_config(root: &Path) -> HarnessConfig {
    let mut config = HarnessConfig {
        project_root: root.to_path_buf(),
        ..Default::default()
    };

    config.startup.install = CommandSpec::new("mkdir node_modules", 10);
    config.startup.check = CommandSpec::new("true", 10);
    config.startup.tests.command = CommandSpec::new("echo 'Tests  3 passed (3)'", 10);

    config.feature.server.command = "echo $$ > server.pid; exec sleep 30".to_string();
    config.feature.server.url = "http://127.0.0.1:9".to_string();
    config.feature.server.readiness = Readiness::Fixed { wait_secs: 1 };
    config.feature.server.shutdown_grace_secs = 2;
    config.feature.browser_install = CommandSpec::new("false", 5);
    config.feature.screenshot_path = None;

    config.performance.diff = CommandSpec::new("printf 'a.ts\\nb.ts\\n'", 10);
    config.performance.tests = CommandSpec::new("echo 'Tests  3 passed (3)'", 10);
    config.performance.check = CommandSpec::new("true", 10);

    config
}

pub fn process_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid), None).is_ok()
}
