use super::*;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_runtime_runs_blocking_jobs() {
    let runtime = AsyncRuntime::new(&RuntimeSettings { worker_threads: 1 }).unwrap();
    let (tx, rx) = mpsc::sync_channel(1);

    runtime.tokio_handle().spawn(async move {
        let value = tokio::task::spawn_blocking(|| 21 * 2).await.unwrap_or(0);
        let _ = tx.send(value);
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(42));
}

#[test]
fn test_zero_workers_is_clamped() {
    assert!(AsyncRuntime::new(&RuntimeSettings { worker_threads: 0 }).is_ok());
}
