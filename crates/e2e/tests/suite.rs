//! Full A/B/C runs with a scripted browser

mod common;

use std::fs;

use dragonfly_e2e::browser::ProbeReport;
use dragonfly_e2e::command::CommandSpec;
use dragonfly_e2e::{TestId, TestRunner};
use tempfile::TempDir;

use common::{harness_config, process_alive, scaffold_project, MockDriver};

fn healthy_page() -> ProbeReport {
    ProbeReport {
        navigated: true,
        sidebar_visible: Some(true),
        content: Some("<aside class=\"Sidebar\">自选股</aside><main>今日行情</main>".to_string()),
        ..Default::default()
    }
}

fn server_pid(root: &std::path::Path) -> i32 {
    fs::read_to_string(root.join("server.pid"))
        .expect("dev server wrote its pid")
        .trim()
        .parse()
        .expect("pid is numeric")
}

#[tokio::test]
async fn healthy_project_passes_everything() {
    let tmp = TempDir::new().unwrap();
    scaffold_project(tmp.path());
    let driver = MockDriver::new(healthy_page());

    let runner = TestRunner::with_driver(harness_config(tmp.path()), Box::new(driver));
    let result = runner.run_all().await;

    assert!(result.all_passed(), "{:#?}", result.outcomes);
    assert_eq!(result.exit_code(), 0);

    let ids: Vec<TestId> = result.outcomes.iter().map(|o| o.id).collect();
    assert_eq!(ids, TestId::ALL.to_vec());

    let report = fs::read_to_string(tmp.path().join("test-report.md")).unwrap();
    assert!(report.contains("ALL TESTS PASSED"));
    assert!(report.contains("Files modified: 2"));
    assert!(report.contains("ready for production"));

    assert!(!process_alive(server_pid(tmp.path())));
}

#[tokio::test]
async fn empty_directory_fails_but_still_reports() {
    let tmp = TempDir::new().unwrap();
    let mut config = harness_config(tmp.path());
    config.performance.diff = CommandSpec::new("false", 5);
    config.performance.tests = CommandSpec::new("false", 5);
    config.performance.check = CommandSpec::new("false", 5);
    config.report.json_path = Some("results/report.json".into());

    let runner = TestRunner::with_driver(config, Box::new(MockDriver::unavailable()));
    let result = runner.run_all().await;

    assert_eq!(result.outcomes.len(), 3);
    assert!(!result.outcomes[0].passed);
    assert!(!result.outcomes[1].passed);
    assert!(result.outcomes[1].check("browser").unwrap().is_hard_failure());
    assert!(result.outcomes[2].passed);
    assert_eq!(result.exit_code(), 1);

    let report = fs::read_to_string(tmp.path().join("test-report.md")).unwrap();
    assert!(report.contains("SOME TESTS FAILED"));
    assert!(report.contains("Files modified: unavailable"));
    assert!(tmp.path().join("results/report.json").is_file());

    // Never got far enough to start a server
    assert!(!tmp.path().join("server.pid").exists());
}

#[tokio::test]
async fn navigation_timeout_fails_b_and_stops_server() {
    let tmp = TempDir::new().unwrap();
    scaffold_project(tmp.path());
    let driver = MockDriver::new(ProbeReport {
        navigated: false,
        navigation_error: Some("page.goto: Timeout 10000ms exceeded".to_string()),
        ..Default::default()
    });

    let mut config = harness_config(tmp.path());
    config.feature.screenshot_path = Some("shots/home.png".into());

    let runner = TestRunner::with_driver(config, Box::new(driver));
    let result = runner.run_all().await;

    let feature = &result.outcomes[1];
    assert!(result.outcomes[0].passed);
    assert!(!feature.passed);
    assert!(result.outcomes[2].passed);
    assert_eq!(result.exit_code(), 1);

    let homepage = feature.check("homepage").unwrap();
    assert!(homepage.is_hard_failure());
    assert!(homepage.detail.contains("Timeout"));
    assert!(feature.check("screenshot").is_none());
    assert!(feature.check("sidebar").is_none());
    assert!(feature.check("teardown").unwrap().passed);

    assert!(!process_alive(server_pid(tmp.path())));
}

#[tokio::test]
async fn report_is_rewritten_on_every_run() {
    let tmp = TempDir::new().unwrap();
    scaffold_project(tmp.path());
    fs::write(tmp.path().join("test-report.md"), "stale report from an earlier run").unwrap();

    let runner = TestRunner::with_driver(
        harness_config(tmp.path()),
        Box::new(MockDriver::new(healthy_page())),
    );
    let result = runner.run_all().await;

    let report = fs::read_to_string(result.report_path.unwrap()).unwrap();
    assert!(!report.contains("stale report"));
    assert!(report.starts_with("# DragonFly Test Report"));
}

#[tokio::test]
async fn unwritable_report_is_a_harness_error() {
    let tmp = TempDir::new().unwrap();
    scaffold_project(tmp.path());
    // A regular file where the report's parent directory should be
    fs::write(tmp.path().join("blocked"), "").unwrap();

    let mut config = harness_config(tmp.path());
    config.report.path = "blocked/test-report.md".into();

    let runner = TestRunner::with_driver(config, Box::new(MockDriver::new(healthy_page())));
    let result = runner.run_all().await;

    assert!(result.all_passed());
    assert!(result.report_path.is_none());
    assert!(result.report_error.is_some());
    assert_eq!(result.exit_code(), 2);
}

#[tokio::test]
async fn failing_test_command_does_not_fail_startup() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("A"), "").unwrap();
    fs::write(tmp.path().join("B"), "").unwrap();
    fs::create_dir(tmp.path().join("node_modules")).unwrap();

    let mut config = harness_config(tmp.path());
    config.startup.required_files = vec!["A".into(), "B".into()];
    config.startup.check = CommandSpec::new("exit 0", 5);
    config.startup.tests.command = CommandSpec::new("exit 1", 5);

    let runner = TestRunner::with_driver(config, Box::new(MockDriver::new(healthy_page())));
    let result = runner.run_all().await;

    let startup = &result.outcomes[0];
    assert_eq!(startup.id, TestId::A);
    assert!(startup.passed);
    assert!(startup.check("test_suite").unwrap().is_warning());
    assert_eq!(result.exit_code(), 0);
}
