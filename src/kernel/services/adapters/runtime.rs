//! Bounded background worker pool shared by analysis and search services.

use crate::kernel::services::ports::RuntimeSettings;
use std::io;

pub struct AsyncRuntime {
    runtime: tokio::runtime::Runtime,
}

impl AsyncRuntime {
    pub fn new(settings: &RuntimeSettings) -> io::Result<Self> {
        let workers = settings.worker_threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(workers)
            .thread_name("zintel-worker")
            .enable_all()
            .build()
            .or_else(|e| {
                tracing::error!(
                    error = %e,
                    "Failed to create multi-thread tokio runtime, falling back to current-thread"
                );
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
            })?;
        tracing::debug!(workers, "background runtime started");
        Ok(Self { runtime })
    }

    pub fn tokio_handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

#[cfg(test)]
#[path = "../../../../tests/unit/kernel/services/adapters/runtime.rs"]
mod tests;
