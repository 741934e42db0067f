use crate::errors::LintFixError;
use crate::lint::LintRunner;
use crate::logging::append_run_log;
use crate::patch::{PatchGenerator, PatchRequest};
use crate::protocol::{EventSender, ProgressEvent};
use crate::runtime::FileSystem;
use crate::types::Outcome;
use crate::worker_pool::ShutdownSignal;
use serde_json::json;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LINT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_retries: u32,
    pub deadline: Duration,
    pub lint_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            deadline: DEFAULT_DEADLINE,
            lint_timeout: DEFAULT_LINT_TIMEOUT,
        }
    }
}

/// Collaborators shared by every worker in a pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub lint: Arc<dyn LintRunner>,
    pub patcher: Arc<dyn PatchGenerator>,
    pub file_system: Arc<dyn FileSystem>,
    pub settings: WorkerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Finished(Outcome),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

enum PatchFailure {
    Interrupted(Interrupt),
    Failed(String),
}

impl From<Interrupt> for PatchFailure {
    fn from(value: Interrupt) -> Self {
        Self::Interrupted(value)
    }
}

/// Runs the lint/patch loop for one file and reports progress on `events`.
pub async fn run_fix_worker(
    context: &WorkerContext,
    path: &Path,
    events: EventSender,
    shutdown: ShutdownSignal,
) -> WorkerExit {
    let worker = FixWorker {
        context,
        path: path.to_path_buf(),
        events,
        shutdown,
        deadline: Instant::now() + context.settings.deadline,
    };
    worker.run().await
}

struct FixWorker<'a> {
    context: &'a WorkerContext,
    path: PathBuf,
    events: EventSender,
    shutdown: ShutdownSignal,
    deadline: Instant,
}

impl FixWorker<'_> {
    async fn run(self) -> WorkerExit {
        match self.run_attempts().await {
            Ok(outcome) => WorkerExit::Finished(outcome),
            Err(Interrupt::Cancelled) => {
                append_run_log(
                    "info",
                    "worker.cancelled",
                    json!({ "path": self.path.display().to_string() }),
                );
                WorkerExit::Cancelled
            }
            Err(Interrupt::DeadlineExceeded) => self.finish_after_deadline().await,
        }
    }

    async fn run_attempts(&self) -> Result<Outcome, Interrupt> {
        let max = self.context.settings.max_retries;
        for attempt in 1..=max {
            self.emit(ProgressEvent::attempt(&self.path, attempt, max))
                .await?;

            let timeout = self
                .context
                .settings
                .lint_timeout
                .min(self.deadline.saturating_duration_since(Instant::now()));
            let report = self
                .guarded(self.context.lint.lint(&self.path, timeout))
                .await?;

            let report = match report {
                Ok(report) => report,
                Err(err) => {
                    append_run_log(
                        "warn",
                        "worker.lint.error",
                        json!({
                            "path": self.path.display().to_string(),
                            "attempt": attempt,
                            "error": err.to_string()
                        }),
                    );
                    self.emit(ProgressEvent::log(&self.path, format!("Lint error: {err}")))
                        .await?;
                    continue;
                }
            };

            if report.passed {
                append_run_log(
                    "info",
                    "worker.lint.passed",
                    json!({ "path": self.path.display().to_string(), "attempt": attempt }),
                );
                self.emit(
                    ProgressEvent::completed(&self.path, Outcome::Fixed).with_log("Lint passed"),
                )
                .await?;
                return Ok(Outcome::Fixed);
            }

            append_run_log(
                "info",
                "worker.lint.failed",
                json!({
                    "path": self.path.display().to_string(),
                    "attempt": attempt,
                    "output": report.output
                }),
            );
            self.emit(ProgressEvent::log(
                &self.path,
                format!("Lint errors:\n{}", report.output),
            ))
            .await?;

            match self.apply_patch(&report.output).await {
                Ok(()) => {
                    self.emit(ProgressEvent::log(&self.path, "Applied AI fix"))
                        .await?;
                }
                Err(PatchFailure::Interrupted(interrupt)) => return Err(interrupt),
                Err(PatchFailure::Failed(detail)) => {
                    append_run_log(
                        "warn",
                        "worker.patch.failed",
                        json!({
                            "path": self.path.display().to_string(),
                            "attempt": attempt,
                            "error": detail
                        }),
                    );
                    self.emit(ProgressEvent::log(&self.path, format!("Fix error: {detail}")))
                        .await?;
                }
            }
        }

        self.emit(ProgressEvent::completed(&self.path, Outcome::Failed))
            .await?;
        Ok(Outcome::Failed)
    }

    async fn apply_patch(&self, lint_output: &str) -> Result<(), PatchFailure> {
        let content = self
            .context
            .file_system
            .read_to_string(&self.path)
            .map_err(|e| PatchFailure::Failed(format!("read file: {}", describe(&e))))?;

        let request = PatchRequest {
            path: self.path.clone(),
            content,
            lint_output: lint_output.to_string(),
        };
        let fixed = self
            .guarded(self.context.patcher.generate(&request))
            .await?
            .map_err(|e| PatchFailure::Failed(format!("AI fix: {}", describe(&e))))?;

        self.context
            .file_system
            .write_atomic(&self.path, &fixed)
            .map_err(|e| PatchFailure::Failed(format!("write file: {}", describe(&e))))
    }

    async fn finish_after_deadline(&self) -> WorkerExit {
        let secs = self.context.settings.deadline.as_secs();
        append_run_log(
            "warn",
            "worker.deadline_exceeded",
            json!({ "path": self.path.display().to_string(), "deadline_seconds": secs }),
        );
        let reported = async {
            self.emit(ProgressEvent::log(
                &self.path,
                format!("Deadline of {secs}s exceeded"),
            ))
            .await?;
            self.emit(ProgressEvent::completed(&self.path, Outcome::Failed))
                .await
        };
        match reported.await {
            Ok(()) => WorkerExit::Finished(Outcome::Failed),
            Err(_) => WorkerExit::Cancelled,
        }
    }

    /// Races `work` against shutdown and this worker's deadline. Losing the
    /// race drops `work`, which aborts the call in flight.
    async fn guarded<F: Future>(&self, work: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(Interrupt::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupt::DeadlineExceeded),
            out = work => Ok(out),
        }
    }

    /// Sends one event, waiting for room on the bus. A closed bus or a
    /// shutdown ends the worker.
    async fn emit(&self, event: ProgressEvent) -> Result<(), Interrupt> {
        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(Interrupt::Cancelled),
            sent = self.events.send(event) => sent.map_err(|_| Interrupt::Cancelled),
        }
    }
}

fn describe(err: &LintFixError) -> String {
    match err {
        LintFixError::Io(msg) | LintFixError::Patch(msg) | LintFixError::Timeout(msg) => {
            msg.clone()
        }
        other => other.to_string(),
    }
}
