use crate::kernel::buffer::{BufferId, Revision, Span, TextIndexError};
use crate::kernel::search::SearchTree;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid file filter: {0}")]
    InvalidFilter(String),
    #[error("Selection is not valid for this snapshot: {0}")]
    Selection(#[from] TextIndexError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<regex::Error> for SearchError {
    fn from(e: regex::Error) -> Self {
        SearchError::InvalidPattern(e.to_string())
    }
}

impl From<globset::Error> for SearchError {
    fn from(e: globset::Error) -> Self {
        SearchError::InvalidFilter(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Buffer,
    Selection(Span),
}

/// Immutable once submitted; a new query supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub pattern: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
    pub whole_word: bool,
    pub scope: SearchScope,
}

impl SearchQuery {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            case_sensitive: true,
            whole_word: false,
            scope: SearchScope::Buffer,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            is_regex: true,
            ..Self::literal(pattern)
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn whole_word(mut self, whole_word: bool) -> Self {
        self.whole_word = whole_word;
        self
    }

    pub fn in_selection(mut self, selection: Span) -> Self {
        self.scope = SearchScope::Selection(selection);
        self
    }
}

/// Capture groups of a regex match. Group 0 is the whole match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCaptures {
    groups: Vec<Option<String>>,
    names: Arc<[Option<String>]>,
}

impl MatchCaptures {
    pub fn new(groups: Vec<Option<String>>, names: Arc<[Option<String>]>) -> Self {
        Self { groups, names }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index)?.as_deref()
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.get(index)
    }

    pub fn has_group_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub span: Span,
    pub line: usize,
    pub col: usize,
    pub captures: Option<MatchCaptures>,
}

impl SearchMatch {
    pub fn new(span: Span, line: usize, col: usize) -> Self {
        Self {
            span,
            line,
            col,
            captures: None,
        }
    }

    pub fn with_captures(mut self, captures: MatchCaptures) -> Self {
        self.captures = Some(captures);
        self
    }

    pub fn start(&self) -> usize {
        self.span.start
    }

    pub fn end(&self) -> usize {
        self.span.end
    }
}

/// Fingerprint of raw file content, compared before cross-file replace rewrites a file.
pub fn content_fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    bytes.len().hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSearchResult {
    pub path: PathBuf,
    pub matches: Vec<SearchMatch>,
    pub error: Option<String>,
    /// Fingerprint of the content the matches were computed against.
    pub fingerprint: u64,
}

impl FileSearchResult {
    pub fn matched(path: PathBuf, matches: Vec<SearchMatch>, fingerprint: u64) -> Self {
        Self {
            path,
            matches,
            error: None,
            fingerprint,
        }
    }

    pub fn failed(path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            path,
            matches: Vec::new(),
            error: Some(error.into()),
            fingerprint: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct MultiFileSearchOutcome {
    pub tree: SearchTree,
    /// Set when the traversal was cancelled before visiting every file.
    pub partial: bool,
    pub files_searched: usize,
    pub total_matches: usize,
}

#[derive(Debug, Clone)]
pub enum SearchMessage {
    Matches {
        search_id: u64,
        buffer: BufferId,
        revision: Revision,
        matches: Arc<[SearchMatch]>,
    },
    Cancelled {
        search_id: u64,
        buffer: BufferId,
    },
    Error {
        search_id: u64,
        buffer: BufferId,
        message: String,
    },
}

impl SearchMessage {
    pub fn search_id(&self) -> u64 {
        match self {
            Self::Matches { search_id, .. }
            | Self::Cancelled { search_id, .. }
            | Self::Error { search_id, .. } => *search_id,
        }
    }
}

#[derive(Debug, Clone)]
pub enum GlobalSearchMessage {
    Progress {
        search_id: u64,
        files_searched: usize,
        tree: SearchTree,
    },
    Complete {
        search_id: u64,
        outcome: MultiFileSearchOutcome,
    },
    Error {
        search_id: u64,
        message: String,
    },
}

impl GlobalSearchMessage {
    pub fn search_id(&self) -> u64 {
        match self {
            Self::Progress { search_id, .. }
            | Self::Complete { search_id, .. }
            | Self::Error { search_id, .. } => *search_id,
        }
    }
}
