//! Debounced dispatch of analysis/search work.
//!
//! The foreground loop feeds every new snapshot into [`DebouncedScheduler::on_change`] and
//! calls [`DebouncedScheduler::poll`] on each tick. Time is passed in explicitly so the
//! quiet-interval behaviour is deterministic under test.

use crate::kernel::buffer::BufferSnapshot;
use crate::kernel::task::{TaskHandle, TaskId};
use std::time::{Duration, Instant};

pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub struct DebouncedScheduler {
    quiet_interval: Duration,
    pending: Option<BufferSnapshot>,
    deadline: Option<Instant>,
    active: Option<TaskHandle>,
}

impl Default for DebouncedScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_INTERVAL)
    }
}

impl DebouncedScheduler {
    pub fn new(quiet_interval: Duration) -> Self {
        Self {
            quiet_interval,
            pending: None,
            deadline: None,
            active: None,
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn active(&self) -> Option<&TaskHandle> {
        self.active.as_ref()
    }

    /// Records `snapshot` as the latest and restarts the quiet interval.
    pub fn on_change(&mut self, snapshot: BufferSnapshot, now: Instant) {
        let newer = self
            .pending
            .as_ref()
            .is_none_or(|pending| snapshot.revision() >= pending.revision());
        if newer {
            self.pending = Some(snapshot);
        }
        self.deadline = Some(now + self.quiet_interval);
    }

    /// Emits the latest snapshot once the quiet interval elapsed without a new change.
    ///
    /// In-flight work on an older revision is cancelled before the snapshot is handed out.
    pub fn poll(&mut self, now: Instant) -> Option<BufferSnapshot> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        let overshoot = now.duration_since(deadline);
        if overshoot.as_millis() > 50 {
            tracing::debug!(
                overshoot_ms = overshoot.as_millis() as u64,
                "debounce overshoot"
            );
        }

        self.deadline = None;
        let snapshot = self.pending.take()?;
        self.cancel_older_than(&snapshot);
        Some(snapshot)
    }

    /// "Analyze now": skips the timer, still cancels prior work first.
    pub fn flush(&mut self, latest: Option<BufferSnapshot>) -> Option<BufferSnapshot> {
        self.deadline = None;
        let snapshot = match (self.pending.take(), latest) {
            (Some(pending), Some(latest)) if pending.revision() > latest.revision() => pending,
            (_, Some(latest)) => latest,
            (pending, None) => pending?,
        };
        self.cancel_active();
        Some(snapshot)
    }

    /// Registers `task` as the in-flight one for this kind, cancelling its predecessor.
    pub fn begin(&mut self, task: TaskHandle) {
        if let Some(prev) = self.active.replace(task) {
            if !prev.is_cancelled() {
                tracing::debug!(task = prev.id(), "superseded task cancelled");
                prev.cancel();
            }
        }
    }

    /// Clears the in-flight slot if `task_id` still owns it.
    pub fn finish(&mut self, task_id: TaskId) -> bool {
        if self.active.as_ref().is_some_and(|t| t.id() == task_id) {
            self.active = None;
            return true;
        }
        false
    }

    pub fn cancel_active(&mut self) -> Option<TaskId> {
        let task = self.active.take()?;
        task.cancel();
        Some(task.id())
    }

    pub fn cancel_task(&mut self, task_id: TaskId) -> bool {
        if self.active.as_ref().is_some_and(|t| t.id() == task_id) {
            return self.cancel_active().is_some();
        }
        false
    }

    /// Drops the pending trigger and any in-flight task.
    pub fn reset(&mut self) {
        self.pending = None;
        self.deadline = None;
        self.cancel_active();
    }

    fn cancel_older_than(&mut self, snapshot: &BufferSnapshot) {
        let stale = self
            .active
            .as_ref()
            .and_then(|t| t.revision())
            .is_some_and(|rev| rev < snapshot.revision());
        if stale {
            self.cancel_active();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/scheduler.rs"]
mod tests;
