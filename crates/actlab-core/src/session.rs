//! Per-experiment staging: an immutable run context plus a session value
//! that owns its own private staging directory, released on drop on every
//! exit path.

use crate::doc::{scalar_text, Doc};
use crate::error::{HarnessError, Result};
use crate::io::atomic_write;
use crate::runner::{ExecOutcome, ExecRequest, WorkflowRunner};
use crate::suite::Experiment;
use crate::workflow;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Where the mutated workflow copy lands inside the staging directory. The
/// runner expects workflows under `.github/workflows/`.
pub const STAGED_WORKFLOW: &str = ".github/workflows/under-test.yml";

/// Env file the runner sources implicitly from its working directory.
pub const ENV_FILE: &str = ".env";

/// Prefix for experiment inputs written into the env file.
pub const INPUT_PREFIX: &str = "INPUT_";

/// Immutable per-run settings; shared by every session.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workflow: PathBuf,
    pub verbose: bool,
    pub echo_logs: bool,
    pub timeout: Option<Duration>,
}

/// One experiment's staged, mutated workflow copy. The user's original file
/// is never touched; the staging directory is removed when the session
/// drops, whether the experiment passed, failed, or errored.
#[derive(Debug)]
pub struct ExperimentSession {
    staging: TempDir,
    event: String,
}

impl ExperimentSession {
    /// Stage the workflow for one experiment: copy, normalize the trigger if
    /// the source is a reusable workflow, apply step overrides, and write
    /// the inputs env file.
    pub fn open(ctx: &RunContext, experiment: &Experiment) -> Result<Self> {
        if !ctx.workflow.exists() {
            return Err(HarnessError::WorkflowNotFound(ctx.workflow.clone()));
        }
        let text = std::fs::read_to_string(&ctx.workflow)?;
        let mut doc = Doc::parse(&text)?;

        if workflow::is_reusable(&doc) {
            tracing::debug!(event = %experiment.event, "normalizing reusable workflow trigger");
            workflow::normalize(&mut doc, &experiment.event);
        }
        workflow::apply_overrides(&mut doc, &experiment.overrides)?;

        let staging = TempDir::new()?;
        atomic_write(
            &staging.path().join(STAGED_WORKFLOW),
            doc.to_yaml()?.as_bytes(),
        )?;

        if !experiment.inputs.is_empty() {
            let mut env = String::new();
            for (key, value) in &experiment.inputs {
                env.push_str(&format!(
                    "{INPUT_PREFIX}{}={}\n",
                    key.to_uppercase(),
                    scalar_text(value)
                ));
            }
            atomic_write(&staging.path().join(ENV_FILE), env.as_bytes())?;
        }

        Ok(Self {
            staging,
            event: experiment.event.clone(),
        })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    pub fn workflow_path(&self) -> PathBuf {
        self.staging.path().join(STAGED_WORKFLOW)
    }

    /// Invoke the runner against the staged copy and capture its log.
    pub fn execute(&self, ctx: &RunContext, runner: &dyn WorkflowRunner) -> Result<ExecOutcome> {
        runner.execute(&ExecRequest {
            event: &self.event,
            staging: self.staging.path(),
            workflow: &self.workflow_path(),
            verbose: ctx.verbose,
            echo: ctx.echo_logs,
            timeout: ctx.timeout,
        })
    }
}
