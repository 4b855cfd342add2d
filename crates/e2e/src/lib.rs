//! DragonFly E2E Harness
//!
//! Rust-controlled end-to-end verification for the DragonFly web app:
//! - A: the project can start (files, dependencies, type check, test suite)
//! - B: the dev server comes up and a headless browser renders the homepage
//! - C: known performance improvements, alongside live repository signals
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TestRunner::run_all (sequential)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StartupVerifier ──► CommandRunner (sh -c, timeout)         │
//! │  FeatureVerifier ──► ServerHandle (process group, polling)  │
//! │                  └─► BrowserDriver (Playwright script)      │
//! │  PerformanceReporter ──► CommandRunner                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [TestOutcome A, B, C] ──► Report ──► test-report.md        │
//! │                              exit code = AND(passed)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod command;
pub mod config;
pub mod error;
pub mod feature;
pub mod outcome;
pub mod perf;
pub mod report;
pub mod runner;
pub mod server;
pub mod startup;

pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use outcome::{CheckResult, Severity, TestId, TestOutcome};
pub use runner::{SuiteResult, TestRunner};
