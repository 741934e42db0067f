use crate::types::{Outcome, Phase, RecordState};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    AttemptStarted { attempt: u32, max: u32 },
    Log,
    Completed(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub path: PathBuf,
    pub kind: ProgressKind,
    pub log: Option<String>,
}

impl ProgressEvent {
    pub fn attempt(path: &Path, attempt: u32, max: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ProgressKind::AttemptStarted { attempt, max },
            log: None,
        }
    }

    pub fn log(path: &Path, line: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ProgressKind::Log,
            log: Some(line.into()),
        }
    }

    pub fn completed(path: &Path, outcome: Outcome) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: ProgressKind::Completed(outcome),
            log: None,
        }
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.log = Some(line.into());
        self
    }

    /// Display label for the status column, `None` when the event leaves it alone.
    pub fn status_label(&self) -> Option<String> {
        match &self.kind {
            ProgressKind::AttemptStarted { attempt, max } => {
                Some(format!("Attempt {attempt}/{max}"))
            }
            ProgressKind::Log => None,
            ProgressKind::Completed(outcome) => Some(outcome.as_str().to_string()),
        }
    }

    /// Phase the record enters, `None` for plain log lines.
    pub fn phase(&self) -> Option<Phase> {
        match &self.kind {
            ProgressKind::AttemptStarted { .. } => Some(Phase::Running),
            ProgressKind::Log => None,
            ProgressKind::Completed(outcome) => Some(Phase::Done(*outcome)),
        }
    }

    pub fn starts_attempt(&self) -> bool {
        matches!(self.kind, ProgressKind::AttemptStarted { .. })
    }

    /// Applies the event to a locked record. The retry count moves only on
    /// `AttemptStarted`; an empty log line is not appended.
    pub fn apply_to(&self, state: &mut RecordState) {
        if let Some(status) = self.status_label() {
            state.status = status;
        }
        if let Some(phase) = self.phase() {
            state.phase = phase;
        }
        if let Some(line) = self.log.as_deref().filter(|line| !line.is_empty()) {
            state.logs.push(line.to_string());
        }
        if self.starts_attempt() {
            state.retries = state.retries.saturating_add(1);
        }
    }
}

pub type EventSender = mpsc::Sender<ProgressEvent>;
pub type EventReceiver = mpsc::Receiver<ProgressEvent>;

/// Bounded progress channel shared by every worker. Senders suspend once
/// `capacity` events are queued.
pub fn event_bus(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}
