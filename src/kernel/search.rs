use crate::kernel::buffer::{BufferId, Revision};
use crate::kernel::services::ports::{
    FileSearchResult, GlobalSearchMessage, MultiFileSearchOutcome, SearchMatch, SearchQuery,
};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("no matches")]
    NoMatches,
}

/// Match set of one query against one buffer revision, ordered by start offset.
#[derive(Debug, Clone)]
pub struct SearchResults {
    buffer: BufferId,
    revision: Revision,
    query: SearchQuery,
    matches: Arc<[SearchMatch]>,
}

impl SearchResults {
    pub fn new(
        buffer: BufferId,
        revision: Revision,
        query: SearchQuery,
        matches: Arc<[SearchMatch]>,
    ) -> Self {
        debug_assert!(matches.windows(2).all(|w| w[0].start() <= w[1].start()));
        Self {
            buffer,
            revision,
            query,
            matches,
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn shared_matches(&self) -> Arc<[SearchMatch]> {
        self.matches.clone()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SearchMatch> {
        self.matches.get(index)
    }

    /// Index after `current`, wrapping from the last match to the first.
    pub fn next(&self, current: usize) -> Result<usize, NavigationError> {
        let len = self.matches.len();
        if len == 0 {
            return Err(NavigationError::NoMatches);
        }
        if current + 1 >= len {
            return Ok(0);
        }
        Ok(current + 1)
    }

    /// Index before `current`, wrapping from the first match to the last.
    pub fn previous(&self, current: usize) -> Result<usize, NavigationError> {
        let len = self.matches.len();
        if len == 0 {
            return Err(NavigationError::NoMatches);
        }
        if current == 0 || current > len {
            return Ok(len - 1);
        }
        Ok(current - 1)
    }

    /// First match starting at or after `offset`, wrapping to the first match.
    pub fn nearest(&self, offset: usize) -> Result<usize, NavigationError> {
        if self.matches.is_empty() {
            return Err(NavigationError::NoMatches);
        }
        let idx = self.matches.partition_point(|m| m.start() < offset);
        Ok(if idx == self.matches.len() { 0 } else { idx })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirNode {
    pub path: PathBuf,
    pub dirs: Vec<Arc<DirNode>>,
    pub files: Vec<Arc<FileSearchResult>>,
}

impl DirNode {
    fn match_count(&self) -> usize {
        self.files.iter().map(|f| f.matches.len()).sum::<usize>()
            + self.dirs.iter().map(|d| d.match_count()).sum::<usize>()
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a FileSearchResult>) {
        for dir in &self.dirs {
            dir.visit(out);
        }
        out.extend(self.files.iter().map(Arc::as_ref));
    }
}

/// Per-file results grouped by directory.
///
/// Built in one go from a finished (or cancelled) traversal and never mutated afterwards;
/// clones share the node graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTree {
    root: Arc<DirNode>,
}

#[derive(Default)]
struct DirBuilder {
    dirs: BTreeMap<OsString, DirBuilder>,
    files: Vec<Arc<FileSearchResult>>,
}

impl DirBuilder {
    fn insert(&mut self, components: &[OsString], file: Arc<FileSearchResult>) {
        match components.split_first() {
            Some((head, rest)) => self
                .dirs
                .entry(head.clone())
                .or_default()
                .insert(rest, file),
            None => self.files.push(file),
        }
    }

    fn freeze(self, path: PathBuf) -> DirNode {
        let dirs = self
            .dirs
            .into_iter()
            .map(|(name, child)| {
                let child_path = path.join(&name);
                Arc::new(child.freeze(child_path))
            })
            .collect();
        DirNode {
            path,
            dirs,
            files: self.files,
        }
    }
}

impl SearchTree {
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(DirNode {
                path: root.into(),
                dirs: Vec::new(),
                files: Vec::new(),
            }),
        }
    }

    /// Groups `results` under `root`. Files outside `root` are attached to the root node.
    pub fn build<I>(root: impl Into<PathBuf>, results: I) -> Self
    where
        I: IntoIterator<Item = Arc<FileSearchResult>>,
    {
        let root = root.into();
        let mut builder = DirBuilder::default();
        for result in results {
            let components: Vec<OsString> = result
                .path
                .strip_prefix(&root)
                .ok()
                .and_then(Path::parent)
                .map(|dir| {
                    dir.components()
                        .map(|c| c.as_os_str().to_os_string())
                        .collect()
                })
                .unwrap_or_default();
            builder.insert(&components, result);
        }
        Self {
            root: Arc::new(builder.freeze(root)),
        }
    }

    pub fn root(&self) -> &DirNode {
        &self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    /// Files in traversal order (subdirectories before a directory's own files).
    pub fn files(&self) -> Vec<&FileSearchResult> {
        let mut out = Vec::new();
        self.root.visit(&mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.files().len()
    }

    pub fn match_count(&self) -> usize {
        self.root.match_count()
    }

    pub fn error_count(&self) -> usize {
        self.files().iter().filter(|f| f.is_error()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.files.is_empty() && self.root.dirs.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileSearchResult> {
        self.files().into_iter().find(|f| f.path == path)
    }
}

/// Foreground view of the multi-file search in progress.
///
/// Messages for any search other than the active one are ignored.
#[derive(Debug, Clone, Default)]
pub struct MultiFileSearchState {
    pub active_search_id: Option<u64>,
    pub searching: bool,
    pub files_searched: usize,
    pub total_matches: usize,
    pub partial: bool,
    pub tree: Option<SearchTree>,
    pub last_error: Option<String>,
}

impl MultiFileSearchState {
    pub fn begin(&mut self, search_id: u64) {
        *self = Self {
            active_search_id: Some(search_id),
            searching: true,
            ..Self::default()
        };
    }

    pub fn is_active(&self, search_id: u64) -> bool {
        self.active_search_id == Some(search_id)
    }

    pub fn apply_message(&mut self, msg: GlobalSearchMessage) -> bool {
        if !self.is_active(msg.search_id()) {
            return false;
        }

        match msg {
            GlobalSearchMessage::Progress {
                files_searched,
                tree,
                ..
            } => {
                if !self.searching {
                    return false;
                }
                self.files_searched = files_searched;
                self.total_matches = tree.match_count();
                self.tree = Some(tree);
                true
            }
            GlobalSearchMessage::Complete {
                outcome:
                    MultiFileSearchOutcome {
                        tree,
                        partial,
                        files_searched,
                        total_matches,
                    },
                ..
            } => {
                self.searching = false;
                self.partial = partial;
                self.files_searched = files_searched;
                self.total_matches = total_matches;
                self.tree = Some(tree);
                true
            }
            GlobalSearchMessage::Error { message, .. } => {
                let changed =
                    self.searching || self.last_error.as_deref() != Some(message.as_str());
                self.searching = false;
                self.last_error = Some(message);
                changed
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/search.rs"]
mod tests;
