//! The workflow-runner boundary: a trait seam so orchestration and
//! assertions can be exercised with canned logs, plus the real `act`-style
//! subprocess implementation.

use crate::error::{HarnessError, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

/// How long to wait for the reader threads to flush captured output after a
/// timed-out runner is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// One invocation of the workflow runner.
#[derive(Debug)]
pub struct ExecRequest<'a> {
    /// Trigger event name, passed as the runner's first argument.
    pub event: &'a str,
    /// Staging directory; becomes the runner's working directory so its
    /// implicit env-file sourcing finds the inputs written there.
    pub staging: &'a Path,
    /// Staged workflow file inside the staging directory.
    pub workflow: &'a Path,
    /// Forward the runner's own verbose flag.
    pub verbose: bool,
    /// Echo log lines to the terminal while capturing them (tee, not fork).
    pub echo: bool,
    /// Kill the runner after this long; None waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Captured result of a runner invocation. A non-zero exit is not an error
/// at this boundary: some experiments assert on failure markers, so the log
/// always flows onward.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub log: String,
    pub success: bool,
    pub timed_out: bool,
}

pub trait WorkflowRunner {
    fn execute(&self, req: &ExecRequest) -> Result<ExecOutcome>;
}

/// Runs workflows by shelling out to a local `act`-compatible binary:
/// `<program> <event> -W <workflow> [--verbose]` with cwd set to the
/// staging directory.
#[derive(Debug)]
pub struct ActRunner {
    program: PathBuf,
}

impl ActRunner {
    /// Resolve the runner program up front so a missing binary aborts the
    /// run before any experiment executes.
    pub fn resolve(program: &str) -> Result<Self> {
        let program = which::which(program)
            .map_err(|_| HarnessError::RunnerNotFound(program.to_string()))?;
        Ok(Self { program })
    }
}

impl WorkflowRunner for ActRunner {
    fn execute(&self, req: &ExecRequest) -> Result<ExecOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(req.event)
            .arg("-W")
            .arg(req.workflow)
            .current_dir(req.staging)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if req.verbose {
            cmd.arg("--verbose");
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::SpawnFailed(e.to_string()))?;
        let child_pid = child.id();

        // Dedicated reader threads per pipe avoid pipe-buffer deadlocks and
        // let the tee echo lines as they arrive. Each reader hands its
        // accumulated buffer back over a channel at EOF, so the timeout path
        // can still collect whatever was captured before the kill.
        let (out_tx, out_rx) = std::sync::mpsc::channel();
        let (err_tx, err_rx) = std::sync::mpsc::channel();
        tee_reader(child.stdout.take(), req.echo, false, out_tx);
        tee_reader(child.stderr.take(), req.echo, true, err_tx);

        let wait_result = match req.timeout {
            None => child.wait(),
            Some(timeout) => {
                // Waiter thread + recv_timeout; on expiry, kill by PID.
                let (tx, rx) = std::sync::mpsc::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(child.wait());
                });
                match rx.recv_timeout(timeout) {
                    Ok(result) => result,
                    Err(_) => {
                        kill_process(child_pid);
                        // The kill closes the pipes, so the readers reach EOF
                        // almost immediately; the grace bounds the wait in
                        // case a grandchild still holds them open.
                        let log = join_streams(
                            drain(&out_rx, DRAIN_GRACE),
                            drain(&err_rx, DRAIN_GRACE),
                        );
                        return Ok(ExecOutcome {
                            log,
                            success: false,
                            timed_out: true,
                        });
                    }
                }
            }
        };

        let log = join_streams(
            out_rx.recv().unwrap_or_default(),
            err_rx.recv().unwrap_or_default(),
        );
        let status = wait_result.map_err(|e| HarnessError::SpawnFailed(e.to_string()))?;
        Ok(ExecOutcome {
            log,
            success: status.success(),
            timed_out: false,
        })
    }
}

/// Accumulate a pipe into a String sent over `done` at EOF; with `echo` set,
/// every captured line is also written through to the corresponding terminal
/// stream unchanged.
fn tee_reader<R>(pipe: Option<R>, echo: bool, to_stderr: bool, done: Sender<String>)
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = pipe {
            let mut reader = BufReader::new(pipe);
            let mut line = String::new();
            while let Ok(n) = reader.read_line(&mut line) {
                if n == 0 {
                    break;
                }
                if echo {
                    if to_stderr {
                        let _ = write!(std::io::stderr(), "{line}");
                    } else {
                        let _ = write!(std::io::stdout(), "{line}");
                    }
                }
                buf.push_str(&line);
                line.clear();
            }
        }
        let _ = done.send(buf);
    });
}

/// Collect a reader's buffer, giving up after `grace` if the pipe never
/// reached EOF.
fn drain(rx: &Receiver<String>, grace: Duration) -> String {
    rx.recv_timeout(grace).unwrap_or_default()
}

fn join_streams(out: String, err: String) -> String {
    if err.is_empty() {
        out
    } else if out.is_empty() {
        err
    } else {
        format!("{out}\n{err}")
    }
}

/// Terminate a process by PID using SIGKILL. Best-effort; errors are
/// silently ignored.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
