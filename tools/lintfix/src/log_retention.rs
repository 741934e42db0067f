use crate::errors::LintFixError;
use std::fs;
use std::path::{Path, PathBuf};

/// Deletes the oldest `*.jsonl` run logs in `dir` until the remaining ones
/// fit in `budget_bytes`. Other files are left alone.
pub fn enforce_total_budget(dir: &Path, budget_bytes: u64) -> Result<Vec<PathBuf>, LintFixError> {
    let mut files = fs::read_dir(dir)
        .map_err(|e| LintFixError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
        .collect::<Vec<_>>();

    files.sort_by(|a, b| {
        let ma = fs::metadata(a).ok().and_then(|m| m.modified().ok());
        let mb = fs::metadata(b).ok().and_then(|m| m.modified().ok());
        ma.cmp(&mb).then_with(|| a.cmp(b))
    });

    let mut total = files
        .iter()
        .filter_map(|path| fs::metadata(path).ok().map(|meta| meta.len()))
        .sum::<u64>();

    let mut deleted = Vec::new();
    for path in files {
        if total <= budget_bytes {
            break;
        }
        let len = fs::metadata(&path)
            .map_err(|e| LintFixError::Io(e.to_string()))?
            .len();
        fs::remove_file(&path).map_err(|e| LintFixError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::enforce_total_budget;
    use std::fs;

    #[test]
    fn prunes_oldest_run_logs_until_budget_is_met() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("run-1.jsonl"), vec![b'x'; 40]).expect("a");
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("run-2.jsonl"), vec![b'x'; 40]).expect("b");
        fs::write(dir.path().join("keep.txt"), vec![b'x'; 400]).expect("c");

        let deleted = enforce_total_budget(dir.path(), 50).expect("pruned");
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with("run-1.jsonl"));
        assert!(dir.path().join("keep.txt").exists());
    }
}
