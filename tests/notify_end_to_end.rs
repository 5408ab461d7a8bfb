// tests/notify_end_to_end.rs

#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use ghost::jobs::{JobContext, WatchJob};
use ghost::watch::NotifySource;
use ghost_test_utils::builders::WatchSpecBuilder;
use ghost_test_utils::memory_log::MemoryLog;
use ghost_test_utils::{eventually, init_tracing, line_count, with_timeout};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn real_file_writes_trigger_matching_runs() -> TestResult {
    init_tracing();
    let root = TempDir::new()?;
    let scratch = TempDir::new()?;
    let out = scratch.path().join("runs.txt");
    let log = MemoryLog::new();
    let ctx = JobContext::new(Arc::new(log.clone()), Arc::new(NotifySource));

    let spec = WatchSpecBuilder::new(
        "e2e",
        root.path(),
        &format!("echo run >> '{}'", out.display()),
    )
    .matches(&["*.txt"])
    .debounce_ms(50)
    .build();
    let job = WatchJob::start(spec, &ctx)?;

    // Give the backend a moment to register its watches.
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(root.path().join("a.json"), "{}")?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(line_count(&out), 0);

    std::fs::write(root.path().join("a.txt"), "a")?;
    tokio::time::sleep(Duration::from_millis(10)).await;
    std::fs::write(root.path().join("b.txt"), "b")?;

    assert!(eventually(Duration::from_secs(5), || line_count(&out) >= 1).await);
    let first_run = log
        .messages()
        .into_iter()
        .find(|m| m.starts_with("starting"))
        .ok_or("no run logged")?;
    assert!(first_run.contains("change:a.txt"), "{first_run}");
    assert!(first_run.contains("change:b.txt"), "{first_run}");
    assert_eq!(log.count_containing("a.json"), 0);

    with_timeout(job.close()).await;
    Ok(())
}
