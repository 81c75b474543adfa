//! Foreground coordinator for every open buffer.
//!
//! The host owns each buffer's latest snapshot and the "which task is active" slots for
//! analysis and search. Workers never touch this state; they report through one result
//! queue that [`IntelHost::tick`] drains. Results from a task that no longer owns its slot
//! are dropped, which keeps publication in revision order.

use crate::kernel::buffer::{BufferId, BufferSnapshot, Revision};
use crate::kernel::diagnostics::{Diagnostic, DiagnosticsEngine};
use crate::kernel::language::LanguageId;
use crate::kernel::problems::ProblemsState;
use crate::kernel::replace::{self, FileReplaceOutcome, ReplaceError, ReplaceTemplate};
use crate::kernel::scheduler::DebouncedScheduler;
use crate::kernel::search::{MultiFileSearchState, SearchResults, SearchTree};
use crate::kernel::services::adapters::diagnostics::DiagnosticsService;
use crate::kernel::services::adapters::search::{
    FileFilter, GlobalSearchService, SearchService, Searcher,
};
use crate::kernel::services::ports::{
    AnalysisMessage, FileSystem, GlobalSearchMessage, MultiFileSearchOutcome, SearchError,
    SearchMessage, SearchQuery, SearchScope, Settings,
};
use crate::kernel::task::{TaskHandle, TaskId};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const MAX_WORKER_DRAIN_PER_TICK: usize = 256;
const WORKER_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown buffer {0}")]
    UnknownBuffer(BufferId),
    #[error("no search results to act on")]
    NoSearchResults,
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Replace(#[from] ReplaceError),
}

pub type Result<T> = std::result::Result<T, HostError>;

#[derive(Debug)]
pub enum WorkerMessage {
    Analysis(AnalysisMessage),
    Search(SearchMessage),
    Global(GlobalSearchMessage),
}

impl From<AnalysisMessage> for WorkerMessage {
    fn from(msg: AnalysisMessage) -> Self {
        Self::Analysis(msg)
    }
}

impl From<SearchMessage> for WorkerMessage {
    fn from(msg: SearchMessage) -> Self {
        Self::Search(msg)
    }
}

impl From<GlobalSearchMessage> for WorkerMessage {
    fn from(msg: GlobalSearchMessage) -> Self {
        Self::Global(msg)
    }
}

/// Notifications for the editor view.
#[derive(Debug)]
pub enum HostEvent {
    DiagnosticsUpdated {
        buffer: BufferId,
        revision: Revision,
        diagnostics: Arc<[Diagnostic]>,
    },
    AnalysisFailed {
        buffer: BufferId,
        revision: Revision,
        reason: String,
    },
    SearchResultsUpdated {
        query_id: TaskId,
        results: SearchResults,
    },
    SearchFailed {
        query_id: TaskId,
        reason: String,
    },
    MultiFileSearchProgress {
        query_id: TaskId,
        files_searched: usize,
        tree: SearchTree,
    },
    MultiFileSearchComplete {
        query_id: TaskId,
        outcome: MultiFileSearchOutcome,
    },
    ReplaceApplied {
        buffer: BufferId,
        revision: Revision,
    },
    ReplaceFailed {
        buffer: Option<BufferId>,
        reason: String,
    },
    FilesReplaced {
        replaced: Vec<PathBuf>,
        failed: Vec<(PathBuf, String)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceTarget {
    /// Index into the buffer's current search results.
    One(usize),
    All,
}

struct ActiveQuery {
    query: SearchQuery,
    searcher: Arc<Searcher>,
}

struct BufferState {
    snapshot: BufferSnapshot,
    analysis: DebouncedScheduler,
    search: DebouncedScheduler,
    query: Option<ActiveQuery>,
    results: Option<SearchResults>,
}

pub struct IntelHost {
    settings: Settings,
    diagnostics: DiagnosticsService,
    search: SearchService,
    global: GlobalSearchService,
    fs: Arc<dyn FileSystem>,
    buffers: FxHashMap<BufferId, BufferState>,
    problems: ProblemsState,
    multi_file: MultiFileSearchState,
    global_task: Option<TaskHandle>,
    global_query: Option<SearchQuery>,
    worker_tx: SyncSender<WorkerMessage>,
    worker_rx: Receiver<WorkerMessage>,
    events: Sender<HostEvent>,
    next_buffer: u64,
}

impl IntelHost {
    pub fn new(
        runtime: tokio::runtime::Handle,
        fs: Arc<dyn FileSystem>,
        settings: Settings,
    ) -> (Self, Receiver<HostEvent>) {
        let (worker_tx, worker_rx) = mpsc::sync_channel(WORKER_QUEUE_CAPACITY);
        let (events, events_rx) = mpsc::channel();
        let engine = DiagnosticsEngine::new(settings.diagnostics.clone());
        let host = Self {
            diagnostics: DiagnosticsService::new(runtime.clone(), engine),
            search: SearchService::new(runtime.clone()),
            global: GlobalSearchService::new(runtime, fs.clone()),
            fs,
            settings,
            buffers: FxHashMap::default(),
            problems: ProblemsState::default(),
            multi_file: MultiFileSearchState::default(),
            global_task: None,
            global_query: None,
            worker_tx,
            worker_rx,
            events,
            next_buffer: 1,
        };
        (host, events_rx)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn problems(&self) -> &ProblemsState {
        &self.problems
    }

    pub fn multi_file_search(&self) -> &MultiFileSearchState {
        &self.multi_file
    }

    pub fn snapshot(&self, buffer: BufferId) -> Option<&BufferSnapshot> {
        self.buffers.get(&buffer).map(|s| &s.snapshot)
    }

    pub fn search_results(&self, buffer: BufferId) -> Option<&SearchResults> {
        self.buffers.get(&buffer)?.results.as_ref()
    }

    /// Opens a buffer at revision 0; its first analysis runs after the quiet interval.
    pub fn open_buffer(&mut self, language: LanguageId, text: &str, now: Instant) -> BufferId {
        let buffer = BufferId::new(self.next_buffer);
        self.next_buffer += 1;

        let snapshot = BufferSnapshot::new(buffer, language, text);
        let mut analysis = DebouncedScheduler::new(self.settings.scheduler.quiet_interval());
        analysis.on_change(snapshot.clone(), now);
        self.buffers.insert(
            buffer,
            BufferState {
                snapshot,
                analysis,
                search: DebouncedScheduler::new(self.settings.scheduler.search_quiet_interval()),
                query: None,
                results: None,
            },
        );
        tracing::debug!(%buffer, language = language.language_id(), "buffer opened");
        buffer
    }

    pub fn close_buffer(&mut self, buffer: BufferId) -> bool {
        let Some(mut state) = self.buffers.remove(&buffer) else {
            return false;
        };
        state.analysis.reset();
        state.search.reset();
        self.problems.remove(buffer);
        tracing::debug!(%buffer, "buffer closed");
        true
    }

    /// Records new buffer content as the next revision and restarts the debounce timers.
    pub fn on_change(&mut self, buffer: BufferId, text: &str, now: Instant) -> Result<Revision> {
        let state = self
            .buffers
            .get_mut(&buffer)
            .ok_or(HostError::UnknownBuffer(buffer))?;
        let snapshot = state.snapshot.with_text(text);
        Self::accept_snapshot(state, snapshot, now);
        Ok(state.snapshot.revision())
    }

    /// A selection-scoped query is dropped on edit: its span belongs to the old revision.
    fn accept_snapshot(state: &mut BufferState, snapshot: BufferSnapshot, now: Instant) {
        state.analysis.on_change(snapshot.clone(), now);
        let scope = state.query.as_ref().map(|active| active.query.scope);
        match scope {
            Some(SearchScope::Selection(_)) => {
                state.search.reset();
                state.query = None;
                state.results = None;
            }
            Some(SearchScope::Buffer) => state.search.on_change(snapshot.clone(), now),
            None => {}
        }
        state.snapshot = snapshot;
    }

    /// Analysis without waiting for the timer; prior analysis of this buffer is cancelled.
    pub fn analyze_now(&mut self, buffer: BufferId) -> Result<TaskId> {
        let state = self
            .buffers
            .get_mut(&buffer)
            .ok_or(HostError::UnknownBuffer(buffer))?;
        let snapshot = state
            .analysis
            .flush(Some(state.snapshot.clone()))
            .unwrap_or_else(|| state.snapshot.clone());
        let task = self.diagnostics.analyze(snapshot, self.worker_tx.clone());
        let id = task.id();
        state.analysis.begin(task);
        Ok(id)
    }

    /// Compiles `query` up front, so a bad pattern fails here and never reaches a worker.
    ///
    /// The query stays active: later edits re-run it after the search quiet interval.
    /// Selection-scoped queries are cleared by the next edit instead.
    pub fn request_search(&mut self, buffer: BufferId, query: SearchQuery) -> Result<TaskId> {
        let state = self
            .buffers
            .get_mut(&buffer)
            .ok_or(HostError::UnknownBuffer(buffer))?;
        let searcher = Arc::new(Searcher::new(&query, &self.settings.search)?);

        let snapshot = state
            .search
            .flush(Some(state.snapshot.clone()))
            .unwrap_or_else(|| state.snapshot.clone());
        state.query = Some(ActiveQuery {
            query,
            searcher: searcher.clone(),
        });
        let task = self
            .search
            .search_snapshot(snapshot, searcher, self.worker_tx.clone());
        let id = task.id();
        state.search.begin(task);
        Ok(id)
    }

    pub fn clear_search(&mut self, buffer: BufferId) -> bool {
        let Some(state) = self.buffers.get_mut(&buffer) else {
            return false;
        };
        state.search.reset();
        state.query = None;
        state.results.take().is_some()
    }

    /// Starts a directory search; a previous one still running is cancelled.
    pub fn request_multi_file_search(
        &mut self,
        root: PathBuf,
        query: SearchQuery,
        filter: FileFilter,
    ) -> Result<TaskId> {
        let searcher = Arc::new(Searcher::new(&query, &self.settings.search)?);
        if let Some(prev) = self.global_task.take() {
            prev.cancel();
        }
        let task = self
            .global
            .search_in_dir(root, searcher, filter, self.worker_tx.clone());
        let id = task.id();
        self.multi_file.begin(id);
        self.global_task = Some(task);
        self.global_query = Some(query);
        Ok(id)
    }

    /// Replaces against the buffer's current search results. `template` expands capture
    /// references only when the results came from a regex query.
    ///
    /// Results computed for an older revision fail with `StaleMatchSet` and leave the
    /// buffer unchanged.
    pub fn request_replace(
        &mut self,
        buffer: BufferId,
        target: ReplaceTarget,
        template: &str,
        now: Instant,
    ) -> Result<Revision> {
        let outcome = self.apply_replace(buffer, target, template, now);
        match &outcome {
            Ok(revision) => {
                self.emit(HostEvent::ReplaceApplied {
                    buffer,
                    revision: *revision,
                });
            }
            Err(e) => {
                tracing::warn!(%buffer, error = %e, "replace failed");
                self.emit(HostEvent::ReplaceFailed {
                    buffer: Some(buffer),
                    reason: e.to_string(),
                });
            }
        }
        outcome
    }

    fn apply_replace(
        &mut self,
        buffer: BufferId,
        target: ReplaceTarget,
        template: &str,
        now: Instant,
    ) -> Result<Revision> {
        let state = self
            .buffers
            .get_mut(&buffer)
            .ok_or(HostError::UnknownBuffer(buffer))?;
        let results = state.results.as_ref().ok_or(HostError::NoSearchResults)?;
        let template = ReplaceTemplate::for_query(results.query(), template);

        let next = match target {
            ReplaceTarget::One(index) => {
                let m = results.get(index).ok_or(HostError::NoSearchResults)?;
                let original = state.snapshot.slice(&m.span).map_err(|e| {
                    ReplaceError::StaleMatchSet(format!("match {index}: {e}"))
                })?;
                replace::replace_one(&state.snapshot, m, &template.expand(m, &original))?
            }
            ReplaceTarget::All => replace::replace_all(&state.snapshot, results.matches(), &template)?,
        };

        let revision = next.revision();
        state.results = None;
        Self::accept_snapshot(state, next, now);
        Ok(revision)
    }

    /// Rewrites every file of the last completed directory search.
    pub fn replace_in_files(&mut self, template: &str) -> Result<Vec<FileReplaceOutcome>> {
        if self.multi_file.searching {
            return Err(HostError::NoSearchResults);
        }
        let tree = self
            .multi_file
            .tree
            .clone()
            .ok_or(HostError::NoSearchResults)?;
        let query = self
            .global_query
            .as_ref()
            .ok_or(HostError::NoSearchResults)?;
        let outcomes = replace::replace_in_files(
            self.fs.as_ref(),
            tree.files(),
            &ReplaceTemplate::for_query(query, template),
        );

        let mut replaced = Vec::new();
        let mut failed = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(_) => replaced.push(outcome.path.clone()),
                Err(e) => failed.push((outcome.path.clone(), e.to_string())),
            }
        }
        self.emit(HostEvent::FilesReplaced { replaced, failed });
        Ok(outcomes)
    }

    /// Cancels the task with `task_id` if it is still in flight.
    pub fn cancel(&mut self, task_id: TaskId) -> bool {
        for state in self.buffers.values_mut() {
            if state.analysis.cancel_task(task_id) || state.search.cancel_task(task_id) {
                return true;
            }
        }
        if self.global_task.as_ref().is_some_and(|t| t.id() == task_id) {
            if let Some(task) = self.global_task.take() {
                task.cancel();
            }
            return true;
        }
        false
    }

    /// Fires due debounce timers, then drains the worker queue. Returns whether any event
    /// was published.
    pub fn tick(&mut self, now: Instant) -> bool {
        for state in self.buffers.values_mut() {
            if let Some(snapshot) = state.analysis.poll(now) {
                let task = self.diagnostics.analyze(snapshot, self.worker_tx.clone());
                state.analysis.begin(task);
            }
            if let Some(snapshot) = state.search.poll(now) {
                if let Some(active) = state.query.as_ref() {
                    let task = self.search.search_snapshot(
                        snapshot,
                        active.searcher.clone(),
                        self.worker_tx.clone(),
                    );
                    state.search.begin(task);
                }
            }
        }

        let mut changed = false;
        let mut drained = 0usize;
        while drained < MAX_WORKER_DRAIN_PER_TICK {
            match self.worker_rx.try_recv() {
                Ok(msg) => {
                    drained += 1;
                    changed |= self.handle_worker_message(msg);
                }
                Err(mpsc::TryRecvError::Empty) | Err(mpsc::TryRecvError::Disconnected) => break,
            }
        }
        changed
    }

    /// Whether any analysis or search is pending or in flight.
    pub fn is_busy(&self) -> bool {
        self.global_task.is_some()
            || self.buffers.values().any(|s| {
                s.analysis.is_pending()
                    || s.analysis.active().is_some()
                    || s.search.is_pending()
                    || s.search.active().is_some()
            })
    }

    fn handle_worker_message(&mut self, msg: WorkerMessage) -> bool {
        match msg {
            WorkerMessage::Analysis(msg) => self.handle_analysis(msg),
            WorkerMessage::Search(msg) => self.handle_search(msg),
            WorkerMessage::Global(msg) => self.handle_global(msg),
        }
    }

    fn handle_analysis(&mut self, msg: AnalysisMessage) -> bool {
        let buffer = msg.buffer();
        let Some(state) = self.buffers.get_mut(&buffer) else {
            return false;
        };
        if !state.analysis.finish(msg.task_id()) {
            tracing::debug!(task = msg.task_id(), %buffer, "dropping superseded analysis result");
            return false;
        }

        match msg {
            AnalysisMessage::Finished {
                revision,
                diagnostics,
                ..
            } => {
                if !self
                    .problems
                    .publish(buffer, revision, diagnostics.clone())
                    .changed()
                {
                    return false;
                }
                self.emit(HostEvent::DiagnosticsUpdated {
                    buffer,
                    revision,
                    diagnostics,
                });
                true
            }
            AnalysisMessage::Cancelled { task_id, .. } => {
                tracing::debug!(task = task_id, %buffer, "analysis cancelled");
                false
            }
            AnalysisMessage::Failed {
                revision, reason, ..
            } => {
                self.emit(HostEvent::AnalysisFailed {
                    buffer,
                    revision,
                    reason,
                });
                true
            }
        }
    }

    fn handle_search(&mut self, msg: SearchMessage) -> bool {
        let query_id = msg.search_id();
        let buffer = match &msg {
            SearchMessage::Matches { buffer, .. }
            | SearchMessage::Cancelled { buffer, .. }
            | SearchMessage::Error { buffer, .. } => *buffer,
        };
        let Some(state) = self.buffers.get_mut(&buffer) else {
            return false;
        };
        if !state.search.finish(query_id) {
            tracing::debug!(search_id = query_id, %buffer, "dropping superseded search result");
            return false;
        }

        match msg {
            SearchMessage::Matches {
                revision, matches, ..
            } => {
                let Some(active) = state.query.as_ref() else {
                    return false;
                };
                let older = state
                    .results
                    .as_ref()
                    .is_some_and(|r| r.revision() > revision);
                if older {
                    return false;
                }
                let results = SearchResults::new(buffer, revision, active.query.clone(), matches);
                state.results = Some(results.clone());
                self.emit(HostEvent::SearchResultsUpdated { query_id, results });
                true
            }
            SearchMessage::Cancelled { .. } => false,
            SearchMessage::Error { message, .. } => {
                self.emit(HostEvent::SearchFailed {
                    query_id,
                    reason: message,
                });
                true
            }
        }
    }

    fn handle_global(&mut self, msg: GlobalSearchMessage) -> bool {
        let query_id = msg.search_id();
        let event = match &msg {
            GlobalSearchMessage::Progress {
                files_searched,
                tree,
                ..
            } => HostEvent::MultiFileSearchProgress {
                query_id,
                files_searched: *files_searched,
                tree: tree.clone(),
            },
            GlobalSearchMessage::Complete { outcome, .. } => HostEvent::MultiFileSearchComplete {
                query_id,
                outcome: outcome.clone(),
            },
            GlobalSearchMessage::Error { message, .. } => HostEvent::SearchFailed {
                query_id,
                reason: message.clone(),
            },
        };
        let finished = !matches!(msg, GlobalSearchMessage::Progress { .. });

        if !self.multi_file.apply_message(msg) {
            return false;
        }
        if finished && self.global_task.as_ref().is_some_and(|t| t.id() == query_id) {
            self.global_task = None;
        }
        self.emit(event);
        true
    }

    fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/host.rs"]
mod tests;
