use crate::errors::LintFixError;
use crate::logging::append_run_log;
use crate::types::{FileRecord, TableItem};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Walks `root` and returns one pending record per file with the given
/// extension. Entries are visited in file-name order, so the result is
/// stable for an unchanged tree. Any traversal error fails the whole call.
pub fn discover_files(root: &Path, extension: &str) -> Result<Vec<Arc<FileRecord>>, LintFixError> {
    let extension = extension.trim_start_matches('.');
    let mut records = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| LintFixError::Discovery(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == extension);
        if matches {
            records.push(Arc::new(FileRecord::new(entry.into_path())));
        }
    }

    append_run_log(
        "info",
        "catalog.discovered",
        json!({
            "root": root.display().to_string(),
            "extension": extension,
            "count": records.len()
        }),
    );
    Ok(records)
}

/// Projects records into table rows: directory headers in lexical order,
/// each followed by its files in discovery order.
pub fn group_by_directory(records: &[Arc<FileRecord>]) -> Vec<TableItem> {
    let mut by_dir: BTreeMap<PathBuf, Vec<Arc<FileRecord>>> = BTreeMap::new();
    for record in records {
        by_dir
            .entry(record.dir_key().to_path_buf())
            .or_default()
            .push(Arc::clone(record));
    }

    let mut items = Vec::with_capacity(records.len() + by_dir.len());
    for (dir, files) in by_dir {
        items.push(TableItem::Directory { path: dir });
        items.extend(files.into_iter().map(TableItem::File));
    }
    items
}
