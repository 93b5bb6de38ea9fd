//! The experiment orchestrator: drives every experiment in the suite
//! through stage → normalize/mutate → execute → assert, and aggregates the
//! verdicts. One bad experiment never hides the results of the rest.

use crate::assertion;
use crate::error::{HarnessError, Result};
use crate::runner::WorkflowRunner;
use crate::session::{ExperimentSession, RunContext};
use crate::suite::{Experiment, ExperimentSuite};
use serde::Serialize;

/// Per-experiment verdict.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub title: String,
    pub passed: bool,
    /// Failure reason, when there is one worth showing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregated suite verdict. The process exit status is 0 iff `failed == 0`,
/// including the empty-suite 0/0 case.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<RunResult>,
    pub total: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Run every experiment strictly sequentially, calling `observer` after each
/// one (the CLI prints its per-experiment line there).
///
/// Per-experiment faults (a failed assertion, a missing step id, a runner
/// timeout, a non-zero runner exit) fold into that experiment's result.
/// Only config/resource errors (unreadable workflow, staging failure, spawn
/// failure) abort the run.
pub fn run_suite(
    ctx: &RunContext,
    suite: &ExperimentSuite,
    runner: &dyn WorkflowRunner,
    observer: &mut dyn FnMut(&RunResult),
) -> Result<RunReport> {
    // The workflow is a required resource even when no experiment will stage
    // it; an empty suite against a missing file is still a config error.
    if !ctx.workflow.exists() {
        return Err(HarnessError::WorkflowNotFound(ctx.workflow.clone()));
    }

    let mut report = RunReport::default();
    for experiment in &suite.experiments {
        let result = match run_experiment(ctx, experiment, runner) {
            Ok(result) => result,
            // A dangling step override is this experiment's failure, not the
            // suite's.
            Err(HarnessError::StepNotFound(id)) => RunResult {
                title: experiment.title.clone(),
                passed: false,
                detail: Some(format!("step '{id}' not found in the workflow")),
            },
            Err(fatal) => return Err(fatal),
        };
        report.total += 1;
        if !result.passed {
            report.failed += 1;
        }
        observer(&result);
        report.results.push(result);
    }
    Ok(report)
}

fn run_experiment(
    ctx: &RunContext,
    experiment: &Experiment,
    runner: &dyn WorkflowRunner,
) -> Result<RunResult> {
    tracing::debug!(title = %experiment.title, event = %experiment.event, "running experiment");
    let session = ExperimentSession::open(ctx, experiment)?;
    let outcome = session.execute(ctx, runner)?;

    if outcome.timed_out {
        return Ok(RunResult {
            title: experiment.title.clone(),
            passed: false,
            detail: Some("runner timed out".to_string()),
        });
    }

    // Pass/fail comes from marker matching alone; a non-zero runner exit is
    // a legitimate thing to assert on.
    let verdict = assertion::evaluate(
        &outcome.log,
        &experiment.assertions.includes,
        &experiment.assertions.excludes,
    );
    Ok(RunResult {
        title: experiment.title.clone(),
        passed: verdict.passed,
        detail: verdict.detail(),
    })
}
