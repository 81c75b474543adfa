//! 诊断服务
//!
//! 在后台 worker 上对快照跑一次 [`DiagnosticsEngine`]；每个任务恰好发回一条 [`AnalysisMessage`]

use crate::kernel::buffer::BufferSnapshot;
use crate::kernel::diagnostics::{AnalysisError, DiagnosticsEngine};
use crate::kernel::services::ports::AnalysisMessage;
use crate::kernel::task::{TaskHandle, TaskKind};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

pub struct DiagnosticsService {
    runtime: tokio::runtime::Handle,
    engine: Arc<DiagnosticsEngine>,
}

impl DiagnosticsService {
    pub fn new(runtime: tokio::runtime::Handle, engine: DiagnosticsEngine) -> Self {
        Self {
            runtime,
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &DiagnosticsEngine {
        &self.engine
    }

    pub fn analyze<M>(&self, snapshot: BufferSnapshot, tx: SyncSender<M>) -> TaskHandle
    where
        M: From<AnalysisMessage> + Send + 'static,
    {
        let task = TaskHandle::new(TaskKind::Analysis, Some(snapshot.revision()));
        let task_id = task.id();
        let cancel = task.token();
        let buffer = snapshot.buffer();
        let revision = snapshot.revision();
        let engine = self.engine.clone();

        self.runtime.spawn(async move {
            let cancel_for_check = cancel.clone();
            let result =
                tokio::task::spawn_blocking(move || engine.analyze_cancellable(&snapshot, &cancel))
                    .await;

            let msg = match result {
                Ok(Ok(diagnostics)) if !cancel_for_check.is_cancelled() => {
                    AnalysisMessage::Finished {
                        task_id,
                        buffer,
                        revision,
                        diagnostics: diagnostics.into(),
                    }
                }
                Ok(Ok(_)) | Ok(Err(AnalysisError::Cancelled)) => AnalysisMessage::Cancelled {
                    task_id,
                    buffer,
                    revision,
                },
                Ok(Err(AnalysisError::Failed(reason))) => {
                    tracing::warn!(task_id, %buffer, revision, %reason, "analysis failed");
                    AnalysisMessage::Failed {
                        task_id,
                        buffer,
                        revision,
                        reason,
                    }
                }
                Err(e) => {
                    tracing::error!(task_id, %buffer, revision, error = %e, "analysis task panicked");
                    AnalysisMessage::Failed {
                        task_id,
                        buffer,
                        revision,
                        reason: format!("Analysis task failed: {}", e),
                    }
                }
            };
            // `send` blocks while the queue is full; keep that off the async workers.
            let _ = tokio::task::spawn_blocking(move || tx.send(M::from(msg))).await;
        });

        task
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/diagnostics.rs"]
mod tests;
