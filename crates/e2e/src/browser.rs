//! Browser automation through Playwright
//!
//! A probe is a single browser session: launch, navigate, wait for the
//! network to go idle, screenshot, inspect, close. [`PlaywrightDriver`]
//! renders the probe into a node script whose `finally` block closes the
//! browser on every path, runs it, and reads one JSON line back.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{kill_process_group, CommandRunner, CommandSpec};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// What one browser session should do
#[derive(Debug, Clone, Serialize)]
pub struct PageProbe {
    pub url: String,
    pub navigation_timeout_ms: u64,
    pub network_idle_timeout_ms: u64,
    pub screenshot_path: Option<PathBuf>,
    pub sidebar_selector: String,
}

/// What the session observed. Fields after `navigation_error` are only
/// populated when navigation succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub navigated: bool,
    #[serde(default)]
    pub navigation_error: Option<String>,
    #[serde(default)]
    pub screenshot_taken: bool,
    #[serde(default)]
    pub screenshot_error: Option<String>,
    #[serde(default)]
    pub sidebar_visible: Option<bool>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub inspection_error: Option<String>,
}

/// The seam between the feature verifier and a browser engine
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Whether the engine is installed and runnable
    async fn is_available(&self) -> bool;

    /// Run one scoped browser session against `probe.url`
    async fn probe(&self, probe: &PageProbe) -> E2eResult<ProbeReport>;
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,

    /// Interpreter for the generated script
    pub node: String,

    /// Exits 0 when Playwright is installed; a timeout counts as missing
    pub version_command: CommandSpec,

    /// Budget for browser launch and teardown on top of the page timeouts
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node: "node".to_string(),
            version_command: CommandSpec::new("npx playwright --version", 30),
            launch_timeout_secs: 30,
        }
    }
}

pub struct PlaywrightDriver {
    config: BrowserConfig,

    /// Project root; its node_modules is where `playwright` resolves from
    root: PathBuf,
}

impl PlaywrightDriver {
    pub fn new(config: BrowserConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    /// Render the probe as a standalone node script
    pub fn build_script(&self, probe: &PageProbe) -> E2eResult<String> {
        let screenshot = match &probe.screenshot_path {
            Some(path) => serde_json::to_string(&path.to_string_lossy())?,
            None => "null".to_string(),
        };

        Ok(format!(
            r#"
const playwright = require('playwright');

(async () => {{
  const report = {{ navigated: false, screenshot_taken: false }};
  const browser = await playwright[{browser}].launch({{ headless: {headless} }});
  try {{
    const page = await browser.newPage();
    try {{
      await page.goto({url}, {{ timeout: {nav_timeout} }});
      await page.waitForLoadState('networkidle', {{ timeout: {idle_timeout} }});
      report.navigated = true;
    }} catch (error) {{
      report.navigation_error = error.message;
    }}

    if (report.navigated) {{
      const screenshotPath = {screenshot};
      if (screenshotPath !== null) {{
        try {{
          await page.screenshot({{ path: screenshotPath, fullPage: true }});
          report.screenshot_taken = true;
        }} catch (error) {{
          report.screenshot_error = error.message;
        }}
      }}
      try {{
        report.sidebar_visible = await page.locator({sidebar}).first().isVisible();
        report.content = await page.content();
      }} catch (error) {{
        report.inspection_error = error.message;
      }}
    }}
  }} finally {{
    await browser.close();
  }}
  console.log(JSON.stringify(report));
}})().catch((error) => {{
  console.error(error.message);
  process.exit(1);
}});
"#,
            browser = serde_json::to_string(self.config.browser.as_str())?,
            headless = self.config.headless,
            url = serde_json::to_string(&probe.url)?,
            nav_timeout = probe.navigation_timeout_ms,
            idle_timeout = probe.network_idle_timeout_ms,
            screenshot = screenshot,
            sidebar = serde_json::to_string(&probe.sidebar_selector)?,
        ))
    }

    /// Hard ceiling for one probe, so a wedged browser cannot stall the run
    fn probe_budget(&self, probe: &PageProbe) -> Duration {
        Duration::from_millis(
            probe
                .navigation_timeout_ms
                .saturating_add(probe.network_idle_timeout_ms),
        )
        .saturating_add(Duration::from_secs(self.config.launch_timeout_secs))
    }

    async fn run_script(&self, script: &str, budget: Duration) -> E2eResult<String> {
        // Removed when dropped, whichever way we leave
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("probe.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut cmd = Command::new(&self.config.node);
        cmd.arg(&script_path)
            .current_dir(&self.root)
            .env("NODE_PATH", self.root.join("node_modules"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The browser Playwright launches joins node's group
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| E2eError::Browser(format!("failed to launch {}: {}", self.config.node, e)))?;
        let pid = child.id();

        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("Browser probe exceeded {}s; killing it", budget.as_secs());
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                return Err(E2eError::BrowserTimeout(budget.as_secs()));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(E2eError::Browser(format!(
                "script failed:\nstdout: {}\nstderr: {}",
                stdout.trim(),
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn is_available(&self) -> bool {
        let result = CommandRunner::new(&self.root)
            .run_spec(&self.config.version_command)
            .await;
        if result.timed_out {
            warn!(
                "`{}` timed out; treating the browser as missing",
                self.config.version_command.command
            );
        }
        result.success
    }

    async fn probe(&self, probe: &PageProbe) -> E2eResult<ProbeReport> {
        info!("Opening {} in headless {}", probe.url, self.config.browser.as_str());
        let script = self.build_script(probe)?;
        let stdout = self.run_script(&script, self.probe_budget(probe)).await?;
        parse_report(&stdout)
    }
}

/// The report is the last non-empty line; page scripts may log above it
pub fn parse_report(stdout: &str) -> E2eResult<ProbeReport> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| E2eError::Browser("probe produced no output".to_string()))?;
    Ok(serde_json::from_str(line)?)
}

/// A captured screenshot, decoded enough to prove it is a real image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub sha256: String,
}

impl ScreenshotArtifact {
    pub fn inspect(path: &Path) -> E2eResult<Self> {
        let (width, height) = image::image_dimensions(path)?;
        let data = std::fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            sha256: hex::encode(hasher.finalize()),
        })
    }
}
