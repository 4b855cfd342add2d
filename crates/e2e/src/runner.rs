//! Orchestrates the three verifiers and the report

use std::path::PathBuf;
use std::time::Instant;
use serde::Serialize;
use tracing::{error, info};

use crate::browser::{BrowserDriver, PlaywrightDriver};
use crate::command::CommandRunner;
use crate::config::HarnessConfig;
use crate::feature::FeatureVerifier;
use crate::outcome::TestOutcome;
use crate::perf::PerformanceReporter;
use crate::report::{Report, ReportGenerator};
use crate::startup::StartupVerifier;

/// Exit code when the report could not be written
pub const EXIT_HARNESS_ERROR: i32 = 2;

/// Result of a full run
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    /// One per verifier, in A, B, C order
    pub outcomes: Vec<TestOutcome>,
    pub report_path: Option<PathBuf>,
    pub report_error: Option<String>,
    pub duration_ms: u64,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// 0 when everything passed, 1 when a verifier failed, 2 when the
    /// report itself could not be written
    pub fn exit_code(&self) -> i32 {
        if self.report_error.is_some() {
            EXIT_HARNESS_ERROR
        } else if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: HarnessConfig,
    commands: CommandRunner,
    driver: Box<dyn BrowserDriver>,
}

impl TestRunner {
    /// Runner driving a real browser through Playwright
    pub fn new(config: HarnessConfig) -> Self {
        let driver = PlaywrightDriver::new(config.feature.browser.clone(), config.root());
        Self::with_driver(config, Box::new(driver))
    }

    pub fn with_driver(config: HarnessConfig, driver: Box<dyn BrowserDriver>) -> Self {
        let commands = CommandRunner::new(config.root());
        Self {
            config,
            commands,
            driver,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run A, B and C strictly in sequence, then write the report.
    ///
    /// B holds the application port and the background process slot, so
    /// nothing here runs concurrently.
    pub async fn run_all(&self) -> SuiteResult {
        let start = Instant::now();
        info!("🧪 DragonFly Web Application Test Suite");
        info!("Testing: A) Startup | B) Features | C) Performance");

        let startup = StartupVerifier::new(&self.config.startup, &self.commands)
            .verify()
            .await;
        let feature = FeatureVerifier::new(&self.config.feature, &self.commands, self.driver.as_ref())
            .verify()
            .await;
        let (performance, summary) =
            PerformanceReporter::new(&self.config.performance, &self.commands)
                .verify()
                .await;

        let outcomes = vec![startup, feature, performance];

        let report = Report::new(&self.config.report.title, outcomes.clone(), summary);
        let generator = ReportGenerator::new(&self.config.report, self.commands.root());
        let (report_path, report_error) = match generator.write(&report) {
            Ok(path) => (Some(path), None),
            Err(e) => {
                error!(
                    "❌ Failed to write report to {}: {}",
                    generator.path().display(),
                    e
                );
                (None, Some(e.to_string()))
            }
        };

        let result = SuiteResult {
            outcomes,
            report_path,
            report_error,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let passed = result.outcomes.iter().filter(|o| o.passed).count();
        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed,
            result.outcomes.len() - passed,
            result.duration_ms
        );

        result
    }
}
