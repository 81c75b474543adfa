//! Published diagnostics, one complete set per buffer.
//!
//! A set is only ever replaced wholesale, and never by a set computed for an older revision
//! than the one already shown.

use crate::kernel::buffer::{BufferId, Revision};
use crate::kernel::diagnostics::{Diagnostic, Severity};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PublishedDiagnostics {
    pub revision: Revision,
    pub diagnostics: Arc<[Diagnostic]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Applied,
    /// Same revision and same content as what is already published.
    Unchanged,
    /// Computed for a revision older than the published one; dropped.
    Stale,
}

impl PublishOutcome {
    pub fn changed(self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
}

#[derive(Debug, Default)]
pub struct ProblemsState {
    by_buffer: FxHashMap<BufferId, PublishedDiagnostics>,
}

impl ProblemsState {
    pub fn publish(
        &mut self,
        buffer: BufferId,
        revision: Revision,
        diagnostics: Arc<[Diagnostic]>,
    ) -> PublishOutcome {
        if let Some(existing) = self.by_buffer.get(&buffer) {
            if revision < existing.revision {
                tracing::debug!(
                    %buffer,
                    revision,
                    published = existing.revision,
                    "dropping stale diagnostics"
                );
                return PublishOutcome::Stale;
            }
            if revision == existing.revision && existing.diagnostics == diagnostics {
                return PublishOutcome::Unchanged;
            }
        }

        self.by_buffer.insert(
            buffer,
            PublishedDiagnostics {
                revision,
                diagnostics,
            },
        );
        PublishOutcome::Applied
    }

    pub fn get(&self, buffer: BufferId) -> Option<&PublishedDiagnostics> {
        self.by_buffer.get(&buffer)
    }

    pub fn revision(&self, buffer: BufferId) -> Option<Revision> {
        self.by_buffer.get(&buffer).map(|p| p.revision)
    }

    pub fn remove(&mut self, buffer: BufferId) -> bool {
        self.by_buffer.remove(&buffer).is_some()
    }

    /// Every published diagnostic, by buffer then by position.
    pub fn items(&self) -> Vec<(BufferId, &Diagnostic)> {
        let mut buffers: Vec<_> = self.by_buffer.keys().copied().collect();
        buffers.sort();
        buffers
            .into_iter()
            .flat_map(|buffer| {
                self.by_buffer[&buffer]
                    .diagnostics
                    .iter()
                    .map(move |d| (buffer, d))
            })
            .collect()
    }

    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for published in self.by_buffer.values() {
            for diagnostic in published.diagnostics.iter() {
                match diagnostic.severity {
                    Severity::Error => counts.errors += 1,
                    Severity::Warning => counts.warnings += 1,
                    Severity::Suggestion => counts.suggestions += 1,
                }
            }
        }
        counts
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/problems.rs"]
mod tests;
