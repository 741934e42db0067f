use crate::errors::LintFixError;
use crate::logging::structured_fallback_line;
use crate::protocol::EventReceiver;
use crate::runtime::Console;
use crate::types::FileRecord;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Non-interactive consumer: applies every event to its record and prints
/// one `file=... state=... message=...` line per event until the bus closes.
pub async fn run_headless(
    records: &[Arc<FileRecord>],
    mut events: EventReceiver,
    console: &dyn Console,
) -> Result<(), LintFixError> {
    let by_path = records
        .iter()
        .map(|record| (record.path().to_path_buf(), Arc::clone(record)))
        .collect::<HashMap<PathBuf, _>>();

    while let Some(event) = events.recv().await {
        let state = match by_path.get(&event.path) {
            Some(record) => {
                let mut guard = record.lock();
                event.apply_to(&mut guard);
                guard.status.clone()
            }
            None => event.status_label().unwrap_or_default(),
        };
        let message = event
            .log
            .clone()
            .or_else(|| event.status_label())
            .unwrap_or_default();
        console.write_line(&structured_fallback_line(
            &event.path.display().to_string(),
            &state,
            &message,
        ))?;
    }
    Ok(())
}
