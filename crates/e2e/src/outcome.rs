//! Verifier outcomes built from individual, severity-tagged checks

use std::fmt;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// The three verifiers, in the order they always run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestId {
    A,
    B,
    C,
}

impl TestId {
    pub const ALL: [TestId; 3] = [TestId::A, TestId::B, TestId::C];

    pub fn title(&self) -> &'static str {
        match self {
            TestId::A => "Application Startup",
            TestId::B => "Feature Testing",
            TestId::C => "Performance Analysis",
        }
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            TestId::A => "A",
            TestId::B => "B",
            TestId::C => "C",
        };
        f.write_str(letter)
    }
}

/// Whether a failed check fails its verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Gating,
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub severity: Severity,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn gating(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Gating,
            passed,
            detail: detail.into(),
        }
    }

    pub fn advisory(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Advisory,
            passed,
            detail: detail.into(),
        }
    }

    /// Fails the verifier it belongs to
    pub fn is_hard_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Gating
    }

    pub fn is_warning(&self) -> bool {
        !self.passed && self.severity == Severity::Advisory
    }

    /// ✅ for a pass, ⚠️ for an advisory failure, ❌ for a hard failure
    pub fn marker(&self) -> &'static str {
        if self.passed {
            "✅"
        } else if self.severity == Severity::Advisory {
            "⚠️"
        } else {
            "❌"
        }
    }
}

/// Result of one verifier run. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub id: TestId,
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub duration_ms: u64,
}

impl TestOutcome {
    /// `passed` is true exactly when no gating check failed
    pub fn new(id: TestId, checks: Vec<CheckResult>, duration_ms: u64) -> Self {
        let passed = !checks.iter().any(CheckResult::is_hard_failure);
        Self {
            id,
            passed,
            checks,
            duration_ms,
        }
    }

    pub fn title(&self) -> &'static str {
        self.id.title()
    }

    pub fn hard_failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.is_hard_failure())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.is_warning())
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Collects checks for one verifier and mirrors each onto the console
pub(crate) struct CheckRecorder {
    id: TestId,
    started: Instant,
    checks: Vec<CheckResult>,
}

impl CheckRecorder {
    pub(crate) fn new(id: TestId) -> Self {
        info!("");
        info!("{}", "=".repeat(60));
        info!("TEST {}: {}", id, id.title());
        info!("{}", "=".repeat(60));
        Self {
            id,
            started: Instant::now(),
            checks: Vec::new(),
        }
    }

    pub(crate) fn pass(&mut self, name: &str, detail: impl Into<String>) {
        self.record(CheckResult::gating(name, true, detail));
    }

    pub(crate) fn fail(&mut self, name: &str, detail: impl Into<String>) {
        self.record(CheckResult::gating(name, false, detail));
    }

    pub(crate) fn advisory(&mut self, name: &str, passed: bool, detail: impl Into<String>) {
        self.record(CheckResult::advisory(name, passed, detail));
    }

    pub(crate) fn record(&mut self, check: CheckResult) {
        if check.is_hard_failure() {
            error!("   {} {}: {}", check.marker(), check.name, check.detail);
        } else if check.is_warning() {
            warn!("   {} {}: {}", check.marker(), check.name, check.detail);
        } else {
            info!("   {} {}: {}", check.marker(), check.name, check.detail);
        }
        self.checks.push(check);
    }

    pub(crate) fn finish(self) -> TestOutcome {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        let outcome = TestOutcome::new(self.id, self.checks, duration_ms);
        if outcome.passed {
            info!("✅ TEST {} PASSED: {}", outcome.id, outcome.title());
        } else {
            error!("❌ TEST {} FAILED: {}", outcome.id, outcome.title());
        }
        outcome
    }
}
