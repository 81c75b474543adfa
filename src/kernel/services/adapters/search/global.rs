//! 多文件搜索
//!
//! - 深度优先遍历，只经由 FileSystem 端口访问磁盘
//! - exclude_dirs 命中的目录整棵剪掉，不会进入
//! - 单个文件读取/解码失败记为错误条目，不中断遍历
//! - 取消后返回已累积的部分结果，并标记 partial

use super::searcher::Searcher;
use crate::kernel::buffer::{BufferId, BufferSnapshot};
use crate::kernel::language::LanguageId;
use crate::kernel::search::SearchTree;
use crate::kernel::services::ports::file::{DirEntry, FileSystem};
use crate::kernel::services::ports::search::{
    content_fingerprint, FileSearchResult, GlobalSearchMessage, MultiFileSearchOutcome, Result,
    SearchError,
};
use crate::kernel::services::ports::SearchSettings;
use crate::kernel::task::{CancelToken, TaskHandle, TaskKind};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::Instant;

/// Searched files between two progress messages.
pub const PROGRESS_INTERVAL: usize = 64;

const BINARY_PROBE_LEN: usize = 8192;

/// Which files a multi-file search reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    /// Globs matched against file names; a file is searched if any matches.
    pub include: Vec<String>,
    /// Globs matched against directory names; a match prunes the whole subtree.
    pub exclude_dirs: Vec<String>,
    pub respect_gitignore: bool,
    pub max_file_size: u64,
    pub skip_binary: bool,
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

impl FileFilter {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            include: settings.include.clone(),
            exclude_dirs: settings.exclude_dirs.clone(),
            respect_gitignore: settings.respect_gitignore,
            max_file_size: settings.max_file_size,
            skip_binary: settings.skip_binary,
        }
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    pub fn with_exclude_dirs(mut self, exclude_dirs: Vec<String>) -> Self {
        self.exclude_dirs = exclude_dirs;
        self
    }

    /// Splits a `,` or `;` separated pattern list (`"*.py, *.txt"`); empty input means `*`.
    ///
    /// Commas inside `{...}` belong to glob alternation and do not split.
    pub fn parse_patterns(input: &str) -> Vec<String> {
        let mut patterns = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        for ch in input.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                ';' => {
                    patterns.push(std::mem::take(&mut current));
                    depth = 0;
                    continue;
                }
                ',' if depth == 0 => {
                    patterns.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        patterns.push(current);

        let patterns: Vec<String> = patterns
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if patterns.is_empty() {
            return vec!["*".to_string()];
        }
        patterns
    }

    fn compile(&self) -> Result<CompiledFilter> {
        let include = if self.include.is_empty() {
            build_globset(&["*".to_string()])?
        } else {
            build_globset(&self.include)?
        };
        Ok(CompiledFilter {
            include,
            exclude_dirs: build_globset(&self.exclude_dirs)?,
            respect_gitignore: self.respect_gitignore,
            max_file_size: self.max_file_size,
            skip_binary: self.skip_binary,
        })
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}

struct CompiledFilter {
    include: GlobSet,
    exclude_dirs: GlobSet,
    respect_gitignore: bool,
    max_file_size: u64,
    skip_binary: bool,
}

/// `.gitignore` rules met on the way down; inner files are consulted first.
#[derive(Debug)]
enum IgnoreStack {
    None,
    Some {
        ignore: Arc<Gitignore>,
        parent: Arc<IgnoreStack>,
    },
}

impl IgnoreStack {
    fn append(self: Arc<Self>, ignore: Gitignore) -> Arc<Self> {
        Arc::new(Self::Some {
            ignore: Arc::new(ignore),
            parent: self,
        })
    }

    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        match self {
            Self::None => false,
            Self::Some { ignore, parent } => match ignore.matched(path, is_dir) {
                ignore::Match::None => parent.is_ignored(path, is_dir),
                ignore::Match::Ignore(_) => true,
                ignore::Match::Whitelist(_) => false,
            },
        }
    }
}

struct Walk<'a, P> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
    searcher: &'a Searcher,
    filter: CompiledFilter,
    cancel: &'a CancelToken,
    on_progress: P,
    results: Vec<Arc<FileSearchResult>>,
    files_searched: usize,
    partial: bool,
}

impl<P> Walk<'_, P>
where
    P: FnMut(usize, SearchTree),
{
    fn walk_dir(&mut self, dir: &Path, ignores: Arc<IgnoreStack>) {
        if self.cancelled() {
            return;
        }

        let entries = match self.fs.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "failed to list directory");
                self.results
                    .push(Arc::new(FileSearchResult::failed(dir.to_path_buf(), e.to_string())));
                return;
            }
        };

        let gitignore = if self.filter.respect_gitignore {
            self.load_gitignore(dir, &entries)
        } else {
            None
        };
        let ignores = match gitignore {
            Some(gitignore) => ignores.append(gitignore),
            None => ignores,
        };

        for entry in &entries {
            if self.cancelled() {
                return;
            }
            if entry.is_symlink {
                continue;
            }

            if entry.is_dir {
                if self.filter.exclude_dirs.is_match(&entry.name) {
                    tracing::debug!(path = %entry.path.display(), "excluded directory pruned");
                    continue;
                }
                if ignores.is_ignored(&entry.path, true) {
                    continue;
                }
                self.walk_dir(&entry.path, ignores.clone());
            } else if entry.is_file {
                if !self.filter.include.is_match(&entry.name)
                    || ignores.is_ignored(&entry.path, false)
                {
                    continue;
                }
                if entry.size > self.filter.max_file_size {
                    tracing::debug!(
                        path = %entry.path.display(),
                        size = entry.size,
                        "oversized file skipped"
                    );
                    continue;
                }
                self.search_file(entry);
            }
        }
    }

    fn search_file(&mut self, entry: &DirEntry) {
        let bytes = match self.fs.read_file(&entry.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %entry.path.display(), error = %e, "failed to read file");
                self.push_result(FileSearchResult::failed(entry.path.clone(), e.to_string()));
                return;
            }
        };

        if self.filter.skip_binary && is_likely_binary(&bytes) {
            return;
        }

        let fingerprint = content_fingerprint(&bytes);
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                self.push_result(FileSearchResult::failed(
                    entry.path.clone(),
                    "file is not valid UTF-8",
                ));
                return;
            }
        };

        let snapshot =
            BufferSnapshot::new(BufferId::new(0), LanguageId::from_path(&entry.path), &text);
        match self.searcher.search_cancellable(&snapshot, self.cancel) {
            Ok(Some(matches)) => {
                if matches.is_empty() {
                    self.count_searched();
                } else {
                    self.push_result(FileSearchResult::matched(
                        entry.path.clone(),
                        matches,
                        fingerprint,
                    ));
                }
            }
            Ok(None) => self.partial = true,
            Err(e) => {
                self.push_result(FileSearchResult::failed(entry.path.clone(), e.to_string()));
            }
        }
    }

    fn push_result(&mut self, result: FileSearchResult) {
        self.results.push(Arc::new(result));
        self.count_searched();
    }

    fn count_searched(&mut self) {
        self.files_searched += 1;
        if self.files_searched.is_multiple_of(PROGRESS_INTERVAL) {
            let tree = SearchTree::build(self.root, self.results.iter().cloned());
            (self.on_progress)(self.files_searched, tree);
        }
    }

    fn load_gitignore(&self, dir: &Path, entries: &[DirEntry]) -> Option<Gitignore> {
        let entry = entries.iter().find(|e| e.is_file && e.name == ".gitignore")?;
        let bytes = self.fs.read_file(&entry.path).ok()?;
        let content = String::from_utf8_lossy(&bytes);

        let mut builder = GitignoreBuilder::new(dir);
        for line in content.lines() {
            if let Err(e) = builder.add_line(Some(entry.path.clone()), line) {
                tracing::debug!(path = %entry.path.display(), error = %e, "bad gitignore line");
            }
        }
        builder.build().ok()
    }

    fn cancelled(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            self.partial = true;
        }
        self.partial
    }
}

fn is_likely_binary(content: &[u8]) -> bool {
    memchr::memchr(0, &content[..content.len().min(BINARY_PROBE_LEN)]).is_some()
}

/// Depth-first search of every file under `root` accepted by `filter`.
///
/// Only an unreadable `root` or an invalid filter fails the call; everything below the root
/// degrades into per-file error entries. When `cancel` fires the files searched so far are
/// returned with `partial` set.
pub fn search_tree<P>(
    fs: &dyn FileSystem,
    root: &Path,
    searcher: &Searcher,
    filter: &FileFilter,
    cancel: &CancelToken,
    on_progress: P,
) -> Result<MultiFileSearchOutcome>
where
    P: FnMut(usize, SearchTree),
{
    let filter = filter.compile()?;
    // Surface an unreadable root as an error instead of a one-entry tree.
    fs.list_dir(root).map_err(SearchError::Io)?;

    let mut walk = Walk {
        fs,
        root,
        searcher,
        filter,
        cancel,
        on_progress,
        results: Vec::new(),
        files_searched: 0,
        partial: false,
    };
    walk.walk_dir(root, Arc::new(IgnoreStack::None));

    let tree = SearchTree::build(root, walk.results);
    Ok(MultiFileSearchOutcome {
        total_matches: tree.match_count(),
        tree,
        partial: walk.partial,
        files_searched: walk.files_searched,
    })
}

pub struct GlobalSearchService {
    runtime: tokio::runtime::Handle,
    fs: Arc<dyn FileSystem>,
}

impl GlobalSearchService {
    pub fn new(runtime: tokio::runtime::Handle, fs: Arc<dyn FileSystem>) -> Self {
        Self { runtime, fs }
    }

    /// Runs [`search_tree`] on a background worker.
    ///
    /// Progress messages may be followed by exactly one `Complete` or `Error`.
    pub fn search_in_dir<M>(
        &self,
        root: PathBuf,
        searcher: Arc<Searcher>,
        filter: FileFilter,
        tx: SyncSender<M>,
    ) -> TaskHandle
    where
        M: From<GlobalSearchMessage> + Send + 'static,
    {
        let task = TaskHandle::new(TaskKind::MultiFileSearch, None);
        let search_id = task.id();
        let cancel = task.token();
        let fs = self.fs.clone();

        self.runtime.spawn(async move {
            let tx_for_blocking = tx.clone();
            let result = tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let result = search_tree(
                    fs.as_ref(),
                    &root,
                    &searcher,
                    &filter,
                    &cancel,
                    |files_searched, tree| {
                        let _ = tx_for_blocking.send(M::from(GlobalSearchMessage::Progress {
                            search_id,
                            files_searched,
                            tree,
                        }));
                    },
                );
                if let Ok(outcome) = &result {
                    tracing::info!(
                        search_id,
                        root = %root.display(),
                        files = outcome.files_searched,
                        matches = outcome.total_matches,
                        partial = outcome.partial,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "multi-file search finished"
                    );
                }
                result
            })
            .await;

            let msg = match result {
                Ok(Ok(outcome)) => GlobalSearchMessage::Complete { search_id, outcome },
                Ok(Err(e)) => GlobalSearchMessage::Error {
                    search_id,
                    message: e.to_string(),
                },
                Err(e) => GlobalSearchMessage::Error {
                    search_id,
                    message: format!("Global search task failed: {}", e),
                },
            };
            // `send` blocks while the queue is full; keep that off the async workers.
            let _ = tokio::task::spawn_blocking(move || tx.send(M::from(msg))).await;
        });

        task
    }
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/global.rs"]
mod tests;
