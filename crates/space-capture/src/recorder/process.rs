//! Lifecycle of one transcoder process.
//!
//! ```text
//! Pending ──spawn ok──▶ Running ──exit 0──────▶ Finished(Succeeded)
//!    │                     └────exit ≠ 0───────▶ Finished(Failed)
//!    └──────spawn err────────────────────────▶ Finished(LaunchFailed)
//! ```

use std::fmt;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::diagnostics::{DiagnosticsSummary, forward_diagnostics};
use crate::{CaptureError, Result};

/// Terminal outcome of a transcoder run.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Exited with code 0.
    Succeeded,
    /// Exited with a non-zero code, or was terminated by a signal (`code: None`).
    Failed { code: Option<i32> },
    /// The OS refused to start the process.
    LaunchFailed(std::io::Error),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Map the outcome onto the pipeline's error taxonomy.
    pub fn into_result(self, program: &str) -> Result<()> {
        match self {
            Self::Succeeded => Ok(()),
            Self::Failed { code } => Err(CaptureError::ExitCode { code }),
            Self::LaunchFailed(source) => Err(CaptureError::Spawn {
                program: program.to_string(),
                source,
            }),
        }
    }
}

#[derive(Debug)]
pub enum ProcessState {
    Pending,
    Running { pid: Option<u32> },
    Finished(ProcessOutcome),
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running { pid: Some(pid) } => write!(f, "running (pid {pid})"),
            Self::Running { pid: None } => f.write_str("running"),
            Self::Finished(ProcessOutcome::Succeeded) => f.write_str("succeeded"),
            Self::Finished(ProcessOutcome::Failed { code: Some(code) }) => {
                write!(f, "failed (exit code {code})")
            }
            Self::Finished(ProcessOutcome::Failed { code: None }) => {
                f.write_str("failed (terminated by signal)")
            }
            Self::Finished(ProcessOutcome::LaunchFailed(e)) => write!(f, "launch failed ({e})"),
        }
    }
}

/// Drives one process from `Pending` to a terminal outcome.
#[derive(Debug)]
pub struct TranscodeProcess {
    program: String,
    state: ProcessState,
}

impl TranscodeProcess {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            state: ProcessState::Pending,
        }
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    fn transition(&mut self, next: ProcessState) {
        debug!(program = %self.program, from = %self.state, to = %next, "Process state change");
        self.state = next;
    }

    fn finish(mut self, outcome: ProcessOutcome) -> ProcessOutcome {
        self.transition(ProcessState::Finished(outcome));
        let ProcessState::Finished(outcome) = self.state else {
            unreachable!("state was set to Finished above");
        };
        outcome
    }

    /// Spawn `command`, stream its stderr and wait for it to exit.
    ///
    /// stdout is discarded and stdin is closed so the process can never stall
    /// on an interactive prompt.
    pub async fn run(mut self, mut command: Command) -> ProcessOutcome {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %self.program, "Failed to launch: {e}");
                return self.finish(ProcessOutcome::LaunchFailed(e));
            }
        };
        self.transition(ProcessState::Running { pid: child.id() });

        let diagnostics = child.stderr.take().map(|stderr| {
            let program = self.program.clone();
            tokio::spawn(async move { forward_diagnostics(stderr, &program).await })
        });

        let status = child.wait().await;

        let summary = match diagnostics {
            Some(task) => task.await.unwrap_or_else(|e| {
                warn!(program = %self.program, "stderr reader task failed: {e}");
                DiagnosticsSummary::default()
            }),
            None => DiagnosticsSummary::default(),
        };

        let outcome = match status {
            Ok(status) if status.success() => ProcessOutcome::Succeeded,
            Ok(status) => ProcessOutcome::Failed {
                code: status.code(),
            },
            Err(e) => {
                error!(program = %self.program, "Error waiting for process: {e}");
                ProcessOutcome::Failed { code: None }
            }
        };

        let elapsed = started.elapsed();
        match &outcome {
            ProcessOutcome::Succeeded => info!(
                program = %self.program,
                elapsed_ms = elapsed.as_millis() as u64,
                stderr_records = summary.records,
                media_secs = summary.last_progress.and_then(|p| p.media_secs),
                size_bytes = summary.last_progress.and_then(|p| p.size_bytes),
                "{} exited with code 0", self.program
            ),
            ProcessOutcome::Failed { code } => warn!(
                program = %self.program,
                elapsed_ms = elapsed.as_millis() as u64,
                stderr_records = summary.records,
                "{} exited with code {:?}", self.program, code
            ),
            ProcessOutcome::LaunchFailed(_) => {}
        }

        self.finish(outcome)
    }
}
