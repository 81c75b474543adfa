use super::*;
use crate::kernel::buffer::BufferId;
use crate::kernel::language::LanguageId;
use crate::kernel::services::ports::DiagnosticsConfig;
use std::sync::mpsc;
use std::time::Duration;

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn test_analysis_finishes_with_full_set() {
    let rt = create_runtime();
    let service = DiagnosticsService::new(
        rt.handle().clone(),
        DiagnosticsEngine::new(DiagnosticsConfig::default()),
    );
    let (tx, rx) = mpsc::sync_channel::<AnalysisMessage>(4);

    let snapshot = BufferSnapshot::new(BufferId::new(5), LanguageId::Python, "import os\n");
    let task = service.analyze(snapshot, tx);

    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(AnalysisMessage::Finished {
            task_id,
            buffer,
            revision,
            diagnostics,
        }) => {
            assert_eq!(task_id, task.id());
            assert_eq!(buffer, BufferId::new(5));
            assert_eq!(revision, 0);
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].code, "unused-import");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn test_cancelled_analysis_reports_cancelled() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let service = DiagnosticsService::new(
        rt.handle().clone(),
        DiagnosticsEngine::new(DiagnosticsConfig::default()),
    );
    let (tx, rx) = mpsc::sync_channel::<AnalysisMessage>(4);

    let snapshot = BufferSnapshot::new(BufferId::new(1), LanguageId::Python, "x = 1\n");
    let task = service.analyze(snapshot, tx);
    task.cancel();

    let msg = rt.block_on(async {
        for _ in 0..200 {
            if let Ok(msg) = rx.try_recv() {
                return Some(msg);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    });

    match msg {
        Some(AnalysisMessage::Cancelled { task_id, .. }) => assert_eq!(task_id, task.id()),
        other => panic!("unexpected message: {other:?}"),
    }
}
