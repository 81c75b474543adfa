//! Headless language-intelligence core: snapshots, analysis, search and replace.

pub mod buffer;
pub mod diagnostics;
pub mod host;
pub mod language;
pub mod problems;
pub mod replace;
pub mod scheduler;
pub mod search;
pub mod services;
pub mod task;

pub use buffer::{BufferId, BufferSnapshot, Position, Revision, Span, TextCoordinateIndex};
pub use diagnostics::{Diagnostic, DiagnosticsEngine, FixHint, Severity};
pub use host::{HostError, HostEvent, IntelHost, ReplaceTarget};
pub use language::LanguageId;
pub use problems::{ProblemsState, PublishOutcome, SeverityCounts};
pub use replace::{ReplaceError, ReplaceTemplate};
pub use scheduler::DebouncedScheduler;
pub use search::{MultiFileSearchState, SearchResults, SearchTree};
pub use task::{CancelToken, TaskHandle, TaskId, TaskKind};
