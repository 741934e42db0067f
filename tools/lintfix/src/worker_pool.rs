use crate::errors::LintFixError;
use crate::logging::append_run_log;
use crate::protocol::EventSender;
use crate::types::{FileRecord, Outcome};
use crate::worker::{run_fix_worker, WorkerContext, WorkerExit};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fires the pool-wide shutdown. Held by the pool owner.
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by every worker.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown fires. Never resolves if the trigger is
    /// dropped without firing.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|fired| *fired).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub fixed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl PoolSummary {
    fn record(&mut self, exit: WorkerExit) {
        match exit {
            WorkerExit::Finished(Outcome::Fixed) => self.fixed += 1,
            WorkerExit::Finished(Outcome::Failed) => self.failed += 1,
            WorkerExit::Cancelled => self.cancelled += 1,
        }
    }
}

pub struct PoolHandle {
    trigger: ShutdownTrigger,
    supervisor: JoinHandle<PoolSummary>,
}

impl PoolHandle {
    pub fn shutdown(&self) {
        append_run_log("info", "pool.shutdown", json!({}));
        self.trigger.trigger();
    }

    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    pub async fn join(self) -> Result<PoolSummary, LintFixError> {
        self.supervisor
            .await
            .map_err(|e| LintFixError::Process(format!("worker pool supervisor failed: {e}")))
    }
}

/// Starts one worker task per record. Each worker owns a clone of `events`;
/// the channel closes when the last worker returns, or immediately when
/// `records` is empty.
pub fn spawn_worker_pool(
    records: &[Arc<FileRecord>],
    context: Arc<WorkerContext>,
    events: EventSender,
) -> PoolHandle {
    let (trigger, signal) = shutdown_channel();
    append_run_log(
        "info",
        "pool.started",
        json!({
            "workers": records.len(),
            "max_retries": context.settings.max_retries,
            "deadline_seconds": context.settings.deadline.as_secs()
        }),
    );

    let workers = records
        .iter()
        .map(|record| {
            let path = record.path().to_path_buf();
            let context = Arc::clone(&context);
            let events = events.clone();
            let signal = signal.clone();
            tokio::spawn(async move { run_fix_worker(&context, &path, events, signal).await })
        })
        .collect::<Vec<_>>();
    drop(events);

    let supervisor = tokio::spawn(async move {
        let mut summary = PoolSummary::default();
        for worker in workers {
            match worker.await {
                Ok(exit) => summary.record(exit),
                Err(err) => {
                    append_run_log(
                        "error",
                        "pool.worker.panicked",
                        json!({ "error": err.to_string() }),
                    );
                    summary.failed += 1;
                }
            }
        }
        append_run_log(
            "info",
            "pool.finished",
            json!({
                "fixed": summary.fixed,
                "failed": summary.failed,
                "cancelled": summary.cancelled
            }),
        );
        summary
    });

    PoolHandle {
        trigger,
        supervisor,
    }
}
