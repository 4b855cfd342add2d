//! Test B: dev server comes up and the homepage renders

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::browser::{BrowserConfig, BrowserDriver, PageProbe, ProbeReport, ScreenshotArtifact};
use crate::command::{CommandRunner, CommandSpec};
use crate::error::E2eError;
use crate::outcome::{CheckRecorder, TestId, TestOutcome};
use crate::server::{ServerConfig, ServerHandle};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,

    /// Run when the browser engine is missing
    pub browser_install: CommandSpec,

    pub navigation_timeout_secs: u64,
    pub network_idle_timeout_secs: u64,

    /// Full-page screenshot destination; `None` skips the screenshot
    pub screenshot_path: Option<PathBuf>,

    pub sidebar_selector: String,

    /// Any of these in the rendered page counts as stock content
    pub content_keywords: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            browser: BrowserConfig::default(),
            browser_install: CommandSpec::new("npx playwright install chromium", 120),
            navigation_timeout_secs: 10,
            network_idle_timeout_secs: 10,
            screenshot_path: Some(PathBuf::from("/tmp/dragonfly_homepage.png")),
            sidebar_selector: r#"[class*="sidebar"], [class*="Sidebar"]"#.to_string(),
            content_keywords: vec!["stock".to_string(), "股票".to_string(), "行情".to_string()],
        }
    }
}

pub struct FeatureVerifier<'a> {
    config: &'a FeatureConfig,
    runner: &'a CommandRunner,
    driver: &'a dyn BrowserDriver,
}

impl<'a> FeatureVerifier<'a> {
    pub fn new(
        config: &'a FeatureConfig,
        runner: &'a CommandRunner,
        driver: &'a dyn BrowserDriver,
    ) -> Self {
        Self {
            config,
            runner,
            driver,
        }
    }

    pub async fn verify(&self) -> TestOutcome {
        let mut checks = CheckRecorder::new(TestId::B);

        if !self.ensure_browser(&mut checks).await {
            return checks.finish();
        }

        info!("1. Starting dev server...");
        let mut server = match ServerHandle::spawn(&self.config.server, self.runner.root()).await {
            Ok(server) => server,
            Err(e) => {
                checks.fail("dev_server", e.to_string());
                return checks.finish();
            }
        };

        self.exercise(&mut server, &mut checks).await;

        // Runs no matter how exercise() ended
        match server.shutdown().await {
            Ok(()) => checks.advisory("teardown", true, "dev server stopped"),
            Err(e) => checks.advisory("teardown", false, format!("dev server teardown: {}", e)),
        }

        checks.finish()
    }

    async fn ensure_browser(&self, checks: &mut CheckRecorder) -> bool {
        if self.driver.is_available().await {
            return true;
        }

        warn!(
            "   ⚠️  Browser engine not installed. Running {}...",
            self.config.browser_install.command
        );
        let result = self.runner.run_spec(&self.config.browser_install).await;
        if !result.success || !self.driver.is_available().await {
            checks.fail(
                "browser",
                format!("{} ({})", E2eError::BrowserNotFound, result.failure_reason()),
            );
            return false;
        }
        checks.pass("browser", "browser engine installed");
        true
    }

    async fn exercise(&self, server: &mut ServerHandle, checks: &mut CheckRecorder) {
        if let Err(e) = server.wait_until_ready(&self.config.server.readiness).await {
            checks.fail("server_ready", e.to_string());
            return;
        }
        checks.pass("server_ready", format!("{} accepting connections", server.url()));

        info!("2. Testing homepage...");
        let probe = self.page_probe(server.url());
        let report = match self.driver.probe(&probe).await {
            Ok(report) => report,
            Err(e) => {
                checks.fail("homepage", format!("failed to load homepage: {}", e));
                return;
            }
        };

        if !report.navigated {
            let reason = report
                .navigation_error
                .as_deref()
                .unwrap_or("navigation did not complete");
            checks.fail("homepage", format!("failed to load homepage: {}", reason));
            return;
        }
        checks.pass("homepage", "homepage loads successfully");

        self.record_screenshot(&probe, &report, checks);

        info!("3. Checking UI elements...");
        self.record_ui_checks(&report, checks);
    }

    fn page_probe(&self, url: &str) -> PageProbe {
        PageProbe {
            url: url.to_string(),
            navigation_timeout_ms: self.config.navigation_timeout_secs.saturating_mul(1000),
            network_idle_timeout_ms: self.config.network_idle_timeout_secs.saturating_mul(1000),
            screenshot_path: self
                .config
                .screenshot_path
                .as_deref()
                .map(|p| self.runner.resolve(p)),
            sidebar_selector: self.config.sidebar_selector.clone(),
        }
    }

    fn record_screenshot(&self, probe: &PageProbe, report: &ProbeReport, checks: &mut CheckRecorder) {
        let Some(path) = &probe.screenshot_path else {
            return;
        };

        if let Some(err) = &report.screenshot_error {
            checks.advisory("screenshot", false, format!("screenshot failed: {}", err));
            return;
        }
        if !report.screenshot_taken {
            checks.advisory("screenshot", false, "screenshot not captured");
            return;
        }

        match ScreenshotArtifact::inspect(path) {
            Ok(shot) => checks.advisory(
                "screenshot",
                true,
                format!(
                    "📸 saved {} ({}x{}, sha256 {})",
                    shot.path.display(),
                    shot.width,
                    shot.height,
                    &shot.sha256[..12]
                ),
            ),
            Err(e) => checks.advisory(
                "screenshot",
                false,
                format!("screenshot at {} unreadable: {}", path.display(), e),
            ),
        }
    }

    fn record_ui_checks(&self, report: &ProbeReport, checks: &mut CheckRecorder) {
        if let Some(err) = &report.inspection_error {
            checks.advisory("ui_elements", false, format!("UI element check had issues: {}", err));
            return;
        }

        match report.sidebar_visible {
            Some(true) => checks.advisory("sidebar", true, "sidebar is visible"),
            _ => checks.advisory("sidebar", false, "sidebar not found (layout may differ)"),
        }

        let content = report.content.as_deref().unwrap_or_default();
        match find_keyword(content, &self.config.content_keywords) {
            Some(keyword) => checks.advisory(
                "stock_content",
                true,
                format!("stock-related content found ({})", keyword),
            ),
            None => checks.advisory(
                "stock_content",
                false,
                "no stock content found (may need to wait for data)",
            ),
        }
    }
}

/// First keyword present in `content`, compared case-insensitively
pub fn find_keyword<'k>(content: &str, keywords: &'k [String]) -> Option<&'k str> {
    let content = content.to_lowercase();
    keywords
        .iter()
        .find(|k| !k.is_empty() && content.contains(&k.to_lowercase()))
        .map(String::as_str)
}
