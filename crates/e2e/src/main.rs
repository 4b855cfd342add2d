//! dragonfly-e2e - runs the A/B/C verification suite and writes the report
//!
//! Exit codes: 0 all passed, 1 a verifier failed, 2 harness error.

use std::path::PathBuf;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use dragonfly_e2e::browser::Browser;
use dragonfly_e2e::runner::EXIT_HARNESS_ERROR;
use dragonfly_e2e::server::Readiness;
use dragonfly_e2e::{E2eResult, HarnessConfig, SuiteResult, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "dragonfly-e2e")]
#[command(author, version, about = "End-to-end verification for the DragonFly web app")]
#[command(after_help = "Exit codes:\n  0  all tests passed\n  1  at least one test failed\n  2  harness error (invalid configuration or report not written)")]
struct Args {
    /// Harness configuration (YAML); defaults apply when omitted
    #[arg(short, long, env = "DRAGONFLY_E2E_CONFIG")]
    config: Option<PathBuf>,

    /// Project root; every relative path and command resolves against it
    #[arg(long, env = "DRAGONFLY_ROOT")]
    project_root: Option<PathBuf>,

    /// URL the dev server serves the app on
    #[arg(long)]
    url: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Wait a fixed number of seconds for the dev server instead of polling
    #[arg(long, value_name = "SECS")]
    fixed_wait: Option<u64>,

    /// Markdown report path
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match tokio::runtime::Runtime::new() {
        Ok(rt) => match rt.block_on(async_main(args)) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                EXIT_HARNESS_ERROR
            }
        },
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            EXIT_HARNESS_ERROR
        }
    };

    std::process::exit(code);
}

async fn async_main(args: Args) -> E2eResult<i32> {
    let config = build_config(args)?;
    config.validate()?;

    let runner = TestRunner::new(config);
    let result = runner.run_all().await;
    print_summary(&result);

    Ok(result.exit_code())
}

fn build_config(args: Args) -> E2eResult<HarnessConfig> {
    let mut config = HarnessConfig::load(args.config.as_deref())?;

    if let Some(root) = args.project_root {
        config.project_root = root;
    }
    if let Some(url) = args.url {
        config.feature.server.url = url;
    }
    if let Some(browser) = args.browser {
        config.feature.browser.browser = browser.parse::<Browser>()?;
    }
    if args.headed {
        config.feature.browser.headless = false;
    }
    if let Some(wait_secs) = args.fixed_wait {
        config.feature.server.readiness = Readiness::Fixed { wait_secs };
    }
    if let Some(report) = args.report {
        config.report.path = report;
    }
    if let Some(json) = args.json {
        config.report.json_path = Some(json);
    }

    Ok(config)
}

fn print_summary(result: &SuiteResult) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Test", "Result", "Warnings", "Duration"]);

    for outcome in &result.outcomes {
        table.add_row(vec![
            format!("{} - {}", outcome.id, outcome.title()),
            if outcome.passed { "✅ PASSED" } else { "❌ FAILED" }.to_string(),
            outcome.warnings().count().to_string(),
            format!("{} ms", outcome.duration_ms),
        ]);
    }

    println!();
    println!("TEST SUITE SUMMARY");
    println!("{table}");

    if let Some(path) = &result.report_path {
        println!("📝 Report: {}", path.display());
    }
    if result.all_passed() {
        println!("\n🎉 ALL TESTS PASSED!");
    } else {
        println!("\n⚠️  Some tests failed");
    }
}
