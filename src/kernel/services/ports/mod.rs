//! Service ports: traits + data contracts.

pub mod analysis;
pub mod file;
pub mod search;
pub mod settings;

pub use analysis::AnalysisMessage;
pub use file::{DirEntry, FileSystem};
pub use search::{
    content_fingerprint, FileSearchResult, GlobalSearchMessage, MatchCaptures, MultiFileSearchOutcome, SearchError,
    SearchMatch, SearchMessage, SearchQuery, SearchScope,
};
pub use settings::{
    DiagnosticsConfig, RuntimeSettings, SchedulerSettings, SearchSettings, Settings,
};
