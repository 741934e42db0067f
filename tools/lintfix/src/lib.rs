pub mod catalog;
pub mod config;
pub mod errors;
pub mod headless;
pub mod hotkeys;
pub mod lint;
pub mod log_retention;
pub mod logging;
pub mod patch;
pub mod protocol;
pub mod runtime;
pub mod tui;
pub mod types;
pub mod worker;
pub mod worker_pool;

use catalog::{discover_files, group_by_directory};
use clap::{error::ErrorKind, Parser};
use config::{load_config, AppConfig, CliOverrides};
use errors::LintFixError;
use headless::run_headless;
use lint::CommandLintRunner;
use logging::{append_run_log, init_run_logger};
use patch::language_for_extension;
use patch::ollama::OllamaClient;
use protocol::event_bus;
use runtime::ProductionRuntime;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tui::{run_terminal_dashboard, Dashboard, ProgressCounts, Theme};
use types::FileRecord;
use worker::WorkerContext;
use worker_pool::spawn_worker_pool;

/// How long quitting waits for cancelled workers before leaving them behind.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Parser)]
#[command(name = "lintfix")]
#[command(about = "Lint files, patch failures with a local model, and re-lint until clean")]
#[command(version)]
pub struct Cli {
    /// Root directory to scan.
    #[arg(long)]
    pub dir: Option<std::path::PathBuf>,
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Lint command template; `{{filepath}}` is replaced with each file.
    #[arg(long)]
    pub lint_cmd: Option<String>,
    #[arg(long)]
    pub ollama_url: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    /// File extension to collect, without the dot.
    #[arg(long)]
    pub extension: Option<String>,
    #[arg(long)]
    pub deadline_seconds: Option<u64>,
    #[arg(long, default_value_t = false)]
    pub stream: bool,
    /// Print progress lines instead of the dashboard.
    #[arg(long, default_value_t = false)]
    pub headless: bool,
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,
}

pub fn run() -> Result<i32, LintFixError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    runtime: &ProductionRuntime,
) -> Result<i32, LintFixError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(LintFixError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        root: cli.dir.clone(),
        extension: cli.extension.clone(),
        max_retries: cli.max_retries,
        lint_command: cli.lint_cmd.clone(),
        base_url: cli.ollama_url.clone(),
        model: cli.model.clone(),
        deadline_seconds: cli.deadline_seconds,
        stream: cli.stream,
        log_dir: cli.log_dir.clone(),
    };
    let cfg = load_config(&overrides, runtime.file_system.as_ref())?;

    if let Err(error) = init_run_logger(&cfg.logging.dir, cfg.logging.budget_bytes) {
        eprintln!("lintfix: run log disabled: {error}");
    }
    append_run_log(
        "info",
        "run.started",
        serde_json::to_value(&cfg).unwrap_or_default(),
    );

    let records = discover_files(&cfg.scan.root, &cfg.scan.extension)?;
    let headless = cli.headless || !runtime.console.stdout_is_tty();

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| LintFixError::Io(format!("failed to start async runtime: {e}")))?;
    let counts = tokio_runtime.block_on(run_pipeline(&cfg, &records, runtime, headless))?;

    runtime.console.write_line(&format!(
        "lintfix: fixed={} failed={} pending={}",
        counts.fixed,
        counts.failed,
        counts.running + counts.pending
    ))?;

    // A dashboard session ends when the user quits; only headless runs
    // report unfinished or failed files through the exit code.
    if headless && (counts.failed > 0 || counts.running + counts.pending > 0) {
        return Ok(1);
    }
    Ok(0)
}

async fn run_pipeline(
    cfg: &AppConfig,
    records: &[Arc<FileRecord>],
    runtime: &ProductionRuntime,
    headless: bool,
) -> Result<ProgressCounts, LintFixError> {
    let context = Arc::new(WorkerContext {
        lint: Arc::new(CommandLintRunner::new(
            cfg.lint.command.clone(),
            Arc::clone(&runtime.process_runner),
        )),
        patcher: Arc::new(OllamaClient::new(
            cfg.patch.base_url.clone(),
            cfg.patch.model.clone(),
            language_for_extension(&cfg.scan.extension),
            cfg.patch.stream,
            cfg.request_timeout(),
        )),
        file_system: Arc::clone(&runtime.file_system),
        settings: cfg.worker_settings(),
    });

    let (tx, rx) = event_bus(cfg.dashboard.channel_capacity);
    let pool = spawn_worker_pool(records, context, tx);

    if headless {
        run_headless(records, rx, runtime.console.as_ref()).await?;
        pool.join().await?;
    } else {
        let theme = if cfg.dashboard.monochrome {
            Theme::monochrome()
        } else {
            Theme::default()
        };
        let mut dashboard = Dashboard::new(
            group_by_directory(records),
            cfg.lint.command.clone(),
            cfg.worker.max_retries,
            80,
            24,
        );
        let result = run_terminal_dashboard(&mut dashboard, &theme, rx).await;

        if !pool.is_finished() {
            pool.shutdown();
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, pool.join()).await {
            Ok(joined) => {
                joined?;
            }
            Err(_) => append_run_log(
                "warn",
                "pool.shutdown.grace_expired",
                json!({ "grace_seconds": SHUTDOWN_GRACE.as_secs() }),
            ),
        }
        result?;
    }

    let counts = ProgressCounts::from_records(records);
    append_run_log(
        "info",
        "run.finished",
        json!({
            "fixed": counts.fixed,
            "failed": counts.failed,
            "unfinished": counts.running + counts.pending
        }),
    );
    Ok(counts)
}
