use crate::errors::LintFixError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs the request to completion. Dropping the returned future kills
    /// the child.
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, LintFixError>;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, LintFixError>;
    /// Replaces `path` so readers see either the old or the new content.
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), LintFixError>;
}

pub trait Console: Send + Sync {
    fn stdout_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), LintFixError>;
}

/// Sibling path used as the staging file for [`FileSystem::write_atomic`].
pub fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

pub struct ProductionProcessRunner;

#[async_trait]
impl ProcessRunner for ProductionProcessRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, LintFixError> {
        let mut cmd = tokio::process::Command::new(&request.program);
        cmd.args(&request.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let pending = cmd.output();
        let output = match request.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                LintFixError::Timeout(format!(
                    "{} did not finish within {}s",
                    request.program,
                    limit.as_secs()
                ))
            })?,
            None => pending.await,
        }
        .map_err(|e| LintFixError::Process(format!("{}: {e}", request.program)))?;

        Ok(ProcessOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, LintFixError> {
        std::fs::read_to_string(path).map_err(|e| LintFixError::Io(e.to_string()))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), LintFixError> {
        let tmp = temp_sibling(path);
        if let Err(e) = std::fs::write(&tmp, contents) {
            let _ = std::fs::remove_file(&tmp);
            return Err(LintFixError::Io(format!("{}: {e}", tmp.display())));
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(LintFixError::Io(format!("{}: {e}", path.display())));
        }
        Ok(())
    }
}

pub struct ProductionConsole;

impl Console for ProductionConsole {
    fn stdout_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdout())
    }

    fn write_line(&self, line: &str) -> Result<(), LintFixError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| LintFixError::Io(e.to_string()))
    }
}

pub struct ProductionRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub console: Arc<dyn Console>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(ProductionProcessRunner),
            console: Arc::new(ProductionConsole),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    writes: Arc<Mutex<Vec<PathBuf>>>,
    fail_next_read: Arc<Mutex<Option<LintFixError>>>,
    fail_next_write: Arc<Mutex<Option<LintFixError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        fs.insert(path, contents);
        fs
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        lock(&self.files).get(path).cloned()
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        lock(&self.writes).clone()
    }

    pub fn set_fail_next_read(&self, error: LintFixError) {
        *lock(&self.fail_next_read) = Some(error);
    }

    pub fn set_fail_next_write(&self, error: LintFixError) {
        *lock(&self.fail_next_write) = Some(error);
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, LintFixError> {
        if let Some(err) = lock(&self.fail_next_read).take() {
            return Err(err);
        }
        self.contents(path)
            .ok_or_else(|| LintFixError::Io(format!("missing file {}", path.display())))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), LintFixError> {
        if let Some(err) = lock(&self.fail_next_write).take() {
            return Err(err);
        }
        lock(&self.writes).push(path.to_path_buf());
        self.insert(path, contents);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeProcessRunner {
    responses: Arc<Mutex<Vec<Result<ProcessOutput, LintFixError>>>>,
    requests: Arc<Mutex<Vec<ProcessRequest>>>,
}

impl FakeProcessRunner {
    pub fn push_response(&self, output: Result<ProcessOutput, LintFixError>) {
        lock(&self.responses).push(output);
    }

    pub fn requests(&self) -> Vec<ProcessRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeProcessRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, LintFixError> {
        lock(&self.requests).push(request);
        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            return Err(LintFixError::Process(
                "no fake response queued".to_string(),
            ));
        }
        responses.remove(0)
    }
}

#[derive(Default, Clone)]
pub struct FakeConsole {
    pub is_tty: bool,
    lines: Arc<Mutex<Vec<String>>>,
}

impl FakeConsole {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }
}

impl Console for FakeConsole {
    fn stdout_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), LintFixError> {
        lock(&self.lines).push(line.to_string());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{
        temp_sibling, FakeFileSystem, FileSystem, ProcessRequest, ProcessRunner,
        ProductionFileSystem, ProductionProcessRunner,
    };
    use crate::errors::LintFixError;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("x.go");
        std::fs::write(&path, "old").expect("seed");

        ProductionFileSystem
            .write_atomic(&path, "new")
            .expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "new");
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn failed_temp_write_keeps_original_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("x.go");
        std::fs::write(&path, "original").expect("seed");
        // A directory squatting on the staging path makes the temp write fail.
        std::fs::create_dir(temp_sibling(&path)).expect("block temp path");

        let err = ProductionFileSystem
            .write_atomic(&path, "replacement")
            .expect_err("must fail");
        assert!(matches!(err, LintFixError::Io(_)));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "original");
    }

    #[test]
    fn temp_sibling_appends_suffix() {
        assert_eq!(temp_sibling(Path::new("a/x.go")), Path::new("a/x.go.tmp"));
    }

    #[test]
    fn fake_file_system_injects_one_shot_failures() {
        let fs = FakeFileSystem::with_file("x.go", "body");
        fs.set_fail_next_read(LintFixError::Io("denied".to_string()));
        assert!(fs.read_to_string(Path::new("x.go")).is_err());
        assert_eq!(fs.read_to_string(Path::new("x.go")).expect("read"), "body");
    }

    #[tokio::test]
    async fn production_runner_captures_exit_code_and_streams() {
        let output = ProductionProcessRunner
            .run(ProcessRequest {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
                timeout: Some(Duration::from_secs(10)),
            })
            .await
            .expect("run");
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn production_runner_times_out() {
        let err = ProductionProcessRunner
            .run(ProcessRequest {
                program: "sleep".to_string(),
                args: vec!["5".to_string()],
                timeout: Some(Duration::from_millis(50)),
            })
            .await
            .expect_err("timeout");
        assert!(matches!(err, LintFixError::Timeout(_)));
    }
}
