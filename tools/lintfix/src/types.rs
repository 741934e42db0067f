use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const STATUS_PENDING: &str = "Pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fixed,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "Fixed",
            Self::Failed => "Failed",
        }
    }
}

/// Where a file is in its lifecycle. Counts and styling key on this, the
/// status string is display text only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Pending,
    Running,
    Done(Outcome),
}

/// Mutable part of a [`FileRecord`]. Only reachable through the record lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordState {
    pub status: String,
    pub phase: Phase,
    pub logs: Vec<String>,
    pub retries: u32,
}

impl Default for RecordState {
    fn default() -> Self {
        Self {
            status: STATUS_PENDING.to_string(),
            phase: Phase::Pending,
            logs: Vec::new(),
            retries: 0,
        }
    }
}

/// One discovered file. The path and directory key never change; status,
/// log lines and retry count sit behind a record-local mutex.
#[derive(Debug)]
pub struct FileRecord {
    path: PathBuf,
    dir_key: PathBuf,
    state: Mutex<RecordState>,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dir_key = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            path,
            dir_key,
            state: Mutex::new(RecordState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir_key(&self) -> &Path {
        &self.dir_key
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn lock(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> RecordState {
        self.lock().clone()
    }
}

#[derive(Debug, Clone)]
pub enum TableItem {
    Directory { path: PathBuf },
    File(std::sync::Arc<FileRecord>),
}

impl TableItem {
    pub fn record(&self) -> Option<&std::sync::Arc<FileRecord>> {
        match self {
            Self::Directory { .. } => None,
            Self::File(record) => Some(record),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}
