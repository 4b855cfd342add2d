//! Harness configuration
//!
//! One value carries every path, command and timeout the verifiers use.
//! Any field missing from the YAML file keeps its default.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::feature::FeatureConfig;
use crate::perf::PerformanceConfig;
use crate::report::ReportConfig;
use crate::server::Readiness;
use crate::startup::StartupConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base directory for every relative path and command
    pub project_root: PathBuf,
    pub startup: StartupConfig,
    pub feature: FeatureConfig,
    pub performance: PerformanceConfig,
    pub report: ReportConfig,
}

impl HarnessConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `path` if given, otherwise fall back to defaults
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// The project root, with an empty value meaning the current directory
    pub fn root(&self) -> PathBuf {
        if self.project_root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            self.project_root.clone()
        }
    }

    /// Reject configurations that cannot possibly run
    pub fn validate(&self) -> E2eResult<()> {
        let commands = [
            ("startup.install", &self.startup.install.command),
            ("startup.check", &self.startup.check.command),
            ("startup.tests.command", &self.startup.tests.command.command),
            ("feature.server.command", &self.feature.server.command),
            (
                "feature.browser.version_command",
                &self.feature.browser.version_command.command,
            ),
            ("performance.diff", &self.performance.diff.command),
            ("performance.tests", &self.performance.tests.command),
            ("performance.check", &self.performance.check.command),
        ];
        for (field, command) in commands {
            if command.trim().is_empty() {
                return Err(E2eError::Config(format!("{} is empty", field)));
            }
        }

        let url = &self.feature.server.url;
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| E2eError::Config(format!("feature.server.url {:?}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(E2eError::Config(format!(
                "feature.server.url must be http(s), got {}",
                parsed.scheme()
            )));
        }

        if let Readiness::Poll { timeout_secs: 0, .. } = self.feature.server.readiness {
            return Err(E2eError::Config(
                "feature.server.readiness.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
