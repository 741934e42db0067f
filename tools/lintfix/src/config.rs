use crate::errors::LintFixError;
use crate::lint::FILEPATH_PLACEHOLDER;
use crate::logging::DEFAULT_DISK_BUDGET_BYTES;
use crate::protocol::DEFAULT_CHANNEL_CAPACITY;
use crate::runtime::FileSystem;
use crate::worker::{WorkerSettings, DEFAULT_DEADLINE, DEFAULT_LINT_TIMEOUT, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub extension: Option<String>,
    pub max_retries: Option<u32>,
    pub lint_command: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub deadline_seconds: Option<u64>,
    pub stream: bool,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub lint: LintConfig,
    pub patch: PatchConfig,
    pub worker: WorkerConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LintConfig {
    pub command: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchConfig {
    pub base_url: String,
    pub model: String,
    pub stream: bool,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    pub max_retries: u32,
    pub deadline_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardConfig {
    pub channel_capacity: usize,
    pub monochrome: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub budget_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig {
                root: PathBuf::from("."),
                extension: "go".to_string(),
            },
            lint: LintConfig {
                command: "golangci-lint run {{filepath}}".to_string(),
                timeout_seconds: DEFAULT_LINT_TIMEOUT.as_secs(),
            },
            patch: PatchConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "deepseek-coder-v2".to_string(),
                stream: false,
                request_timeout_seconds: 120,
            },
            worker: WorkerConfig {
                max_retries: DEFAULT_MAX_RETRIES,
                deadline_seconds: DEFAULT_DEADLINE.as_secs(),
            },
            dashboard: DashboardConfig {
                channel_capacity: DEFAULT_CHANNEL_CAPACITY,
                monochrome: false,
            },
            logging: LoggingConfig {
                dir: PathBuf::from(".cache/lintfix/logs"),
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
        }
    }
}

impl AppConfig {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            max_retries: self.worker.max_retries,
            deadline: Duration::from_secs(self.worker.deadline_seconds),
            lint_timeout: Duration::from_secs(self.lint.timeout_seconds),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.patch.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    scan: Option<PartialScanConfig>,
    lint: Option<PartialLintConfig>,
    patch: Option<PartialPatchConfig>,
    worker: Option<PartialWorkerConfig>,
    dashboard: Option<PartialDashboardConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialScanConfig {
    root: Option<PathBuf>,
    extension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLintConfig {
    command: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialPatchConfig {
    base_url: Option<String>,
    model: Option<String>,
    stream: Option<bool>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialWorkerConfig {
    max_retries: Option<u32>,
    deadline_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDashboardConfig {
    channel_capacity: Option<usize>,
    monochrome: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    dir: Option<PathBuf>,
    budget_bytes: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    fs: &dyn FileSystem,
) -> Result<AppConfig, LintFixError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents = fs.read_to_string(path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| LintFixError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(scan) = partial.scan {
        if let Some(root) = scan.root {
            cfg.scan.root = root;
        }
        if let Some(extension) = scan.extension {
            cfg.scan.extension = extension;
        }
    }

    if let Some(lint) = partial.lint {
        if let Some(command) = lint.command {
            cfg.lint.command = command;
        }
        if let Some(value) = lint.timeout_seconds {
            cfg.lint.timeout_seconds = value;
        }
    }

    if let Some(patch) = partial.patch {
        if let Some(base_url) = patch.base_url {
            cfg.patch.base_url = base_url;
        }
        if let Some(model) = patch.model {
            cfg.patch.model = model;
        }
        if let Some(stream) = patch.stream {
            cfg.patch.stream = stream;
        }
        if let Some(value) = patch.request_timeout_seconds {
            cfg.patch.request_timeout_seconds = value;
        }
    }

    if let Some(worker) = partial.worker {
        if let Some(max_retries) = worker.max_retries {
            cfg.worker.max_retries = max_retries;
        }
        if let Some(value) = worker.deadline_seconds {
            cfg.worker.deadline_seconds = value;
        }
    }

    if let Some(dashboard) = partial.dashboard {
        if let Some(capacity) = dashboard.channel_capacity {
            cfg.dashboard.channel_capacity = capacity;
        }
        if let Some(monochrome) = dashboard.monochrome {
            cfg.dashboard.monochrome = monochrome;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(dir) = logging.dir {
            cfg.logging.dir = dir;
        }
        if let Some(budget) = logging.budget_bytes {
            cfg.logging.budget_bytes = budget;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(root) = &overrides.root {
        cfg.scan.root = root.clone();
    }
    if let Some(extension) = &overrides.extension {
        cfg.scan.extension = extension.clone();
    }
    if let Some(max_retries) = overrides.max_retries {
        cfg.worker.max_retries = max_retries;
    }
    if let Some(command) = &overrides.lint_command {
        cfg.lint.command = command.clone();
    }
    if let Some(base_url) = &overrides.base_url {
        cfg.patch.base_url = base_url.clone();
    }
    if let Some(model) = &overrides.model {
        cfg.patch.model = model.clone();
    }
    if let Some(deadline) = overrides.deadline_seconds {
        cfg.worker.deadline_seconds = deadline;
    }
    if overrides.stream {
        cfg.patch.stream = true;
    }
    if let Some(dir) = &overrides.log_dir {
        cfg.logging.dir = dir.clone();
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), LintFixError> {
    if cfg.worker.max_retries == 0 {
        return Err(LintFixError::InvalidConfig(
            "worker.max_retries must be greater than zero".to_string(),
        ));
    }

    if cfg.worker.deadline_seconds == 0 {
        return Err(LintFixError::InvalidConfig(
            "worker.deadline_seconds must be greater than zero".to_string(),
        ));
    }

    if cfg.dashboard.channel_capacity == 0 {
        return Err(LintFixError::InvalidConfig(
            "dashboard.channel_capacity must be greater than zero".to_string(),
        ));
    }

    if !cfg.lint.command.contains(FILEPATH_PLACEHOLDER) {
        return Err(LintFixError::InvalidConfig(format!(
            "lint.command must contain {FILEPATH_PLACEHOLDER}"
        )));
    }

    if cfg.scan.extension.trim_start_matches('.').trim().is_empty() {
        return Err(LintFixError::InvalidConfig(
            "scan.extension must not be empty".to_string(),
        ));
    }

    if cfg.patch.model.trim().is_empty()
        || cfg.patch.model == "..."
        || cfg.patch.model.eq_ignore_ascii_case("todo")
    {
        return Err(LintFixError::InvalidConfig(
            "patch.model must be a real model id".to_string(),
        ));
    }

    let url = cfg.patch.base_url.trim();
    let has_host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .is_some_and(|rest| !rest.trim_matches('/').is_empty());
    if !has_host {
        return Err(LintFixError::InvalidConfig(format!(
            "patch.base_url must be an http(s) URL, got {url:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, AppConfig, CliOverrides};
    use crate::errors::LintFixError;
    use crate::runtime::FakeFileSystem;
    use std::path::PathBuf;
    use std::time::Duration;

    fn with_file(toml: &str) -> (FakeFileSystem, CliOverrides) {
        let fs = FakeFileSystem::with_file("/cfg/lintfix.toml", toml);
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/cfg/lintfix.toml")),
            ..CliOverrides::default()
        };
        (fs, overrides)
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = load_config(&CliOverrides::default(), &FakeFileSystem::default()).expect("cfg");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.worker.max_retries, 5);
        assert_eq!(cfg.patch.base_url, "http://localhost:11434");
        assert_eq!(cfg.dashboard.channel_capacity, 100);
        assert_eq!(cfg.worker_settings().deadline, Duration::from_secs(300));
    }

    #[test]
    fn partial_file_merges_field_by_field() {
        let (fs, overrides) = with_file(
            "[lint]\ntimeout_seconds = 30\n\n[patch]\nmodel = \"qwen2.5-coder\"\n",
        );
        let cfg = load_config(&overrides, &fs).expect("cfg");
        assert_eq!(cfg.lint.timeout_seconds, 30);
        assert_eq!(cfg.lint.command, "golangci-lint run {{filepath}}");
        assert_eq!(cfg.patch.model, "qwen2.5-coder");
        assert_eq!(cfg.patch.base_url, "http://localhost:11434");
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let (fs, mut overrides) = with_file("[worker]\nmax_retries = 9\n");
        overrides.max_retries = Some(2);
        overrides.lint_command = Some("go vet {{filepath}}".to_string());
        overrides.stream = true;
        let cfg = load_config(&overrides, &fs).expect("cfg");
        assert_eq!(cfg.worker.max_retries, 2);
        assert_eq!(cfg.lint.command, "go vet {{filepath}}");
        assert!(cfg.patch.stream);
    }

    #[test]
    fn unknown_section_is_a_parse_error() {
        let (fs, overrides) = with_file("[scheduler]\nlease = 3\n");
        let err = load_config(&overrides, &fs).expect_err("parse");
        assert!(matches!(err, LintFixError::ConfigParse(_)));
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/nope.toml")),
            ..CliOverrides::default()
        };
        let err = load_config(&overrides, &FakeFileSystem::default()).expect_err("io");
        assert!(matches!(err, LintFixError::Io(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let fs = FakeFileSystem::default();
        let cases = [
            CliOverrides {
                max_retries: Some(0),
                ..CliOverrides::default()
            },
            CliOverrides {
                lint_command: Some("golangci-lint run".to_string()),
                ..CliOverrides::default()
            },
            CliOverrides {
                model: Some("todo".to_string()),
                ..CliOverrides::default()
            },
            CliOverrides {
                base_url: Some("localhost:11434".to_string()),
                ..CliOverrides::default()
            },
            CliOverrides {
                deadline_seconds: Some(0),
                ..CliOverrides::default()
            },
        ];
        for overrides in cases {
            let err = load_config(&overrides, &fs).expect_err("invalid");
            assert!(matches!(err, LintFixError::InvalidConfig(_)), "{err:?}");
        }
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let (fs, overrides) = with_file("[dashboard]\nchannel_capacity = 0\n");
        let err = load_config(&overrides, &fs).expect_err("invalid");
        assert!(matches!(err, LintFixError::InvalidConfig(msg) if msg.contains("channel_capacity")));
    }
}
