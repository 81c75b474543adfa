use crate::kernel::buffer::{BufferId, Revision};
use crate::kernel::diagnostics::Diagnostic;
use crate::kernel::task::TaskId;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum AnalysisMessage {
    Finished {
        task_id: TaskId,
        buffer: BufferId,
        revision: Revision,
        diagnostics: Arc<[Diagnostic]>,
    },
    Cancelled {
        task_id: TaskId,
        buffer: BufferId,
        revision: Revision,
    },
    Failed {
        task_id: TaskId,
        buffer: BufferId,
        revision: Revision,
        reason: String,
    },
}

impl AnalysisMessage {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Finished { task_id, .. }
            | Self::Cancelled { task_id, .. }
            | Self::Failed { task_id, .. } => *task_id,
        }
    }

    pub fn buffer(&self) -> BufferId {
        match self {
            Self::Finished { buffer, .. }
            | Self::Cancelled { buffer, .. }
            | Self::Failed { buffer, .. } => *buffer,
        }
    }
}
