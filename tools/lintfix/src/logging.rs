use crate::errors::LintFixError;
use crate::log_retention::enforce_total_budget;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 20 * 1024 * 1024;

static RUN_LOGGER: OnceLock<JsonlLogger> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: 4096,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), LintFixError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LintFixError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| LintFixError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LintFixError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| LintFixError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| LintFixError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Installs the process-wide run log under `dir` as `run-<unix>.jsonl` and
/// prunes older runs down to `budget_bytes`. Later calls keep the first logger.
pub fn init_run_logger(dir: &Path, budget_bytes: u64) -> Result<PathBuf, LintFixError> {
    if let Some(existing) = RUN_LOGGER.get() {
        return Ok(existing.path.clone());
    }
    fs::create_dir_all(dir).map_err(|e| LintFixError::Io(e.to_string()))?;
    let _ = enforce_total_budget(dir, budget_bytes)?;

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let logger = JsonlLogger::new(dir.join(format!("run-{stamp}.jsonl")));
    let path = logger.path.clone();
    let _ = RUN_LOGGER.set(logger);
    Ok(path)
}

/// Appends to the run log when one is installed. Logging failures never
/// reach the caller.
pub fn append_run_log(level: &str, event_type: &str, payload: Value) {
    let Some(logger) = RUN_LOGGER.get() else {
        return;
    };
    let _ = logger.append(&LogEvent {
        level,
        event_type,
        payload,
    });
}

pub fn structured_fallback_line(path: &str, state: &str, message: &str) -> String {
    format!(
        "file={path} state={state} message={} ",
        message.replace('\n', "\\n")
    )
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}
