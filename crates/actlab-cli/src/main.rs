mod output;

use actlab_core::harness::{self, RunReport, RunResult};
use actlab_core::runner::ActRunner;
use actlab_core::session::RunContext;
use actlab_core::suite::ExperimentSuite;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "actlab",
    about = "Experiment harness for CI workflows: stub out steps, replay events, assert on runner logs",
    version
)]
struct Cli {
    /// Workflow file under test
    #[arg(short = 'W', long)]
    workflow: PathBuf,

    /// Experiment suite file
    #[arg(short = 't', long = "tests")]
    tests: PathBuf,

    /// Forward the runner's own verbose flag
    #[arg(long)]
    verbose: bool,

    /// Enable harness debug logging
    #[arg(long)]
    debug: bool,

    /// Echo runner logs live while still capturing them for assertion
    #[arg(long = "live-logs")]
    live_logs: bool,

    /// Workflow runner program (name on PATH or an explicit path)
    #[arg(long, default_value = "act", env = "ACTLAB_RUNNER")]
    runner: String,

    /// Kill a runner invocation after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0")]
    timeout: u64,

    /// Output the final report as JSON
    #[arg(long, short = 'j')]
    json: bool,
}

fn main() {
    // Argument errors exit 1 like every other failure; help/version keep
    // clap's success exit.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e)
            if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let default_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(report) if report.all_passed() => std::process::exit(0),
        Ok(_) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    // Fail fast: suite and runner problems abort before any experiment runs.
    let suite = ExperimentSuite::load(&cli.tests)?;
    let runner = ActRunner::resolve(&cli.runner)?;

    let ctx = RunContext {
        workflow: cli.workflow.clone(),
        verbose: cli.verbose,
        echo_logs: cli.live_logs,
        timeout: match cli.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    };

    let quiet = cli.json;
    let mut observer = |result: &RunResult| {
        if quiet {
            return;
        }
        print_result(result);
    };
    let report = harness::run_suite(&ctx, &suite, &runner, &mut observer)?;

    if cli.json {
        output::print_json(&report)?;
    } else {
        println!(
            "\n{} passed, {} failed ({} total)",
            report.total - report.failed,
            report.failed,
            report.total
        );
    }
    Ok(report)
}

fn print_result(result: &RunResult) {
    let mark = if result.passed { "✓" } else { "✗" };
    println!("{mark} {}", result.title);
    if let Some(detail) = &result.detail {
        println!("    {detail}");
    }
}
