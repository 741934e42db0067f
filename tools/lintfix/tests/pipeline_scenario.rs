use async_trait::async_trait;
use lintfix::catalog::group_by_directory;
use lintfix::errors::LintFixError;
use lintfix::lint::{LintReport, LintRunner};
use lintfix::patch::{PatchGenerator, PatchRequest};
use lintfix::protocol::event_bus;
use lintfix::runtime::FakeFileSystem;
use lintfix::tui::{render_to_string, Dashboard, Theme};
use lintfix::types::FileRecord;
use lintfix::worker::{WorkerContext, WorkerSettings};
use lintfix::worker_pool::{spawn_worker_pool, PoolSummary};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Files under `a/` pass, files under `slow/` hang, everything else fails.
struct DirectoryLint;

#[async_trait]
impl LintRunner for DirectoryLint {
    async fn lint(&self, path: &Path, _timeout: Duration) -> Result<LintReport, LintFixError> {
        if path.starts_with("slow") {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        Ok(LintReport {
            passed: path.starts_with("a"),
            output: format!("{}:1:1: unused variable", path.display()),
        })
    }
}

#[derive(Default)]
struct AppendingPatcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PatchGenerator for AppendingPatcher {
    async fn generate(&self, request: &PatchRequest) -> Result<String, LintFixError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}// patched\n", request.content))
    }
}

fn context(
    fs: &FakeFileSystem,
    patcher: Arc<AppendingPatcher>,
    max_retries: u32,
    deadline: Duration,
) -> Arc<WorkerContext> {
    Arc::new(WorkerContext {
        lint: Arc::new(DirectoryLint),
        patcher,
        file_system: Arc::new(fs.clone()),
        settings: WorkerSettings {
            max_retries,
            deadline,
            lint_timeout: Duration::from_secs(120),
        },
    })
}

#[tokio::test]
async fn passing_and_failing_files_reach_their_final_rows() {
    let fs = FakeFileSystem::default();
    fs.insert("a/x.go", "package a\n");
    fs.insert("b/y.go", "package b\n");
    let records = vec![
        Arc::new(FileRecord::new("a/x.go")),
        Arc::new(FileRecord::new("b/y.go")),
    ];
    let patcher = Arc::new(AppendingPatcher::default());
    let mut dashboard = Dashboard::new(group_by_directory(&records), "golangci-lint run {{filepath}}", 2, 120, 30);

    let (tx, mut rx) = event_bus(100);
    let pool = spawn_worker_pool(
        &records,
        context(&fs, Arc::clone(&patcher), 2, Duration::from_secs(300)),
        tx,
    );
    while let Some(event) = rx.recv().await {
        assert!(dashboard.apply_event(&event));
    }
    dashboard.mark_closed();

    let labels = dashboard
        .rows()
        .iter()
        .map(|row| row.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["a/", "  x.go", "b/", "  y.go"]);
    assert_eq!(dashboard.rows()[1].status, "Fixed");
    assert_eq!(dashboard.rows()[3].status, "Failed");
    assert_eq!(records[0].snapshot().retries, 1);
    assert_eq!(records[1].snapshot().retries, 2);
    assert_eq!(dashboard.rows()[3].attempts, "2/2");
    assert!(dashboard.is_closed());

    assert_eq!(patcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        fs.contents(Path::new("b/y.go")).expect("patched"),
        "package b\n// patched\n// patched\n"
    );
    assert_eq!(
        pool.join().await.expect("join"),
        PoolSummary {
            fixed: 1,
            failed: 1,
            cancelled: 0
        }
    );

    let frame = render_to_string(&dashboard, &Theme::default(), 120, 30).expect("render");
    assert!(frame.contains("fixed=1 failed=1 running=0 pending=0"));
    assert!(frame.contains("stream closed"));
}

#[tokio::test]
async fn failing_file_log_reads_in_attempt_order() {
    let fs = FakeFileSystem::with_file("b/y.go", "package b\n");
    let records = vec![Arc::new(FileRecord::new("b/y.go"))];
    let (tx, mut rx) = event_bus(4);
    let pool = spawn_worker_pool(
        &records,
        context(&fs, Arc::new(AppendingPatcher::default()), 2, Duration::from_secs(300)),
        tx,
    );
    let mut dashboard = Dashboard::new(group_by_directory(&records), "lint {{filepath}}", 2, 120, 30);
    while let Some(event) = rx.recv().await {
        dashboard.apply_event(&event);
    }
    pool.join().await.expect("join");

    assert_eq!(
        records[0].snapshot().logs,
        vec![
            "Lint errors:\nb/y.go:1:1: unused variable".to_string(),
            "Applied AI fix".to_string(),
            "Lint errors:\nb/y.go:1:1: unused variable".to_string(),
            "Applied AI fix".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn deadline_fails_only_the_slow_file() {
    let fs = FakeFileSystem::default();
    fs.insert("a/x.go", "package a\n");
    let records = vec![
        Arc::new(FileRecord::new("a/x.go")),
        Arc::new(FileRecord::new("slow/z.go")),
    ];
    let (tx, mut rx) = event_bus(100);
    let pool = spawn_worker_pool(
        &records,
        context(&fs, Arc::new(AppendingPatcher::default()), 3, Duration::from_secs(5)),
        tx,
    );
    let mut dashboard = Dashboard::new(group_by_directory(&records), "lint {{filepath}}", 3, 120, 30);
    while let Some(event) = rx.recv().await {
        dashboard.apply_event(&event);
    }

    assert_eq!(records[0].snapshot().status, "Fixed");
    let slow = records[1].snapshot();
    assert_eq!(slow.status, "Failed");
    assert_eq!(slow.logs, vec!["Deadline of 5s exceeded".to_string()]);
    assert_eq!(
        pool.join().await.expect("join"),
        PoolSummary {
            fixed: 1,
            failed: 1,
            cancelled: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn quitting_cancels_outstanding_workers() {
    let records = vec![
        Arc::new(FileRecord::new("slow/p.go")),
        Arc::new(FileRecord::new("slow/q.go")),
    ];
    let (tx, mut rx) = event_bus(100);
    let pool = spawn_worker_pool(
        &records,
        context(
            &FakeFileSystem::default(),
            Arc::new(AppendingPatcher::default()),
            3,
            Duration::from_secs(3600),
        ),
        tx,
    );

    // Both workers report their first attempt before hanging in lint.
    for _ in 0..2 {
        assert!(rx.recv().await.expect("attempt").starts_attempt());
    }
    pool.shutdown();
    drop(rx);

    let summary = pool.join().await.expect("join");
    assert_eq!(summary.cancelled, 2);
    assert_eq!(records[0].snapshot().status, "Pending");
}
