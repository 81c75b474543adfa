//! Scheduling tokens for background work.
//!
//! Cancellation is cooperative: workers poll [`CancelToken::is_cancelled`] at bounded
//! intervals (one top-level syntax node, one line batch, one file) and bail out.

use crate::kernel::buffer::Revision;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub type TaskId = u64;

static TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TASK_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Analysis,
    Search,
    MultiFileSearch,
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    kind: TaskKind,
    revision: Option<Revision>,
    token: CancelToken,
}

impl TaskHandle {
    pub fn new(kind: TaskKind, revision: Option<Revision>) -> Self {
        Self {
            id: next_task_id(),
            kind,
            revision,
            token: CancelToken::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Snapshot revision the task works on; `None` for multi-file searches.
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}
