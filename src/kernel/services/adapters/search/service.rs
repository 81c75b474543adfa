//! 单缓冲区搜索服务
//!
//! 在后台 worker 上对不可变快照跑 [`Searcher`]，结果通过 result queue 送回前台

use super::searcher::Searcher;
use crate::kernel::buffer::BufferSnapshot;
use crate::kernel::services::ports::search::SearchMessage;
use crate::kernel::task::{TaskHandle, TaskKind};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Instant;

pub struct SearchService {
    runtime: tokio::runtime::Handle,
}

impl SearchService {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Searches `snapshot` in the background; exactly one message is delivered per task.
    ///
    /// The pattern is already compiled, so an invalid regex never reaches a worker.
    pub fn search_snapshot<M>(
        &self,
        snapshot: BufferSnapshot,
        searcher: Arc<Searcher>,
        tx: SyncSender<M>,
    ) -> TaskHandle
    where
        M: From<SearchMessage> + Send + 'static,
    {
        let task = TaskHandle::new(TaskKind::Search, Some(snapshot.revision()));
        let search_id = task.id();
        let cancel = task.token();
        let buffer = snapshot.buffer();
        let revision = snapshot.revision();

        self.runtime.spawn(async move {
            let cancel_for_check = cancel.clone();
            let result = tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let result = searcher.search_cancellable(&snapshot, &cancel);
                tracing::debug!(
                    search_id,
                    %buffer,
                    revision,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "buffer search finished"
                );
                result
            })
            .await;

            let msg = match result {
                Ok(Ok(Some(matches))) if !cancel_for_check.is_cancelled() => {
                    SearchMessage::Matches {
                        search_id,
                        buffer,
                        revision,
                        matches: matches.into(),
                    }
                }
                Ok(Ok(_)) => SearchMessage::Cancelled { search_id, buffer },
                Ok(Err(e)) => SearchMessage::Error {
                    search_id,
                    buffer,
                    message: e.to_string(),
                },
                Err(e) => {
                    if cancel_for_check.is_cancelled() {
                        SearchMessage::Cancelled { search_id, buffer }
                    } else {
                        SearchMessage::Error {
                            search_id,
                            buffer,
                            message: format!("Search task failed: {}", e),
                        }
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
#[path = "../../../../../tests/unit/kernel/services/adapters/search/service.rs"]
mod tests;
