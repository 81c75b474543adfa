//! Command line front end over [`IntelHost`].

use clap::{Args, Parser, Subcommand};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use zintel::kernel::buffer::BufferId;
use zintel::kernel::diagnostics::Severity;
use zintel::kernel::host::{HostError, HostEvent, IntelHost};
use zintel::kernel::language::LanguageId;
use zintel::kernel::replace::{self, ReplaceTemplate};
use zintel::kernel::search::SearchTree;
use zintel::kernel::services::adapters::{
    load_settings, settings::load_settings_from, AsyncRuntime, FileFilter, LocalFileSystem,
    SettingsError,
};
use zintel::kernel::services::ports::{SearchQuery, Settings};
use zintel::kernel::BufferSnapshot;

const IDLE_SLEEP: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("search failed: {0}")]
    Search(String),
}

#[derive(Parser, Debug)]
#[command(name = "zintel", version, about = "Diagnostics, search and replace for source files")]
pub struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to the per-user settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report diagnostics for the given files
    Check {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Search a directory tree
    Search {
        pattern: String,

        #[arg(value_name = "PATH", default_value = ".")]
        root: PathBuf,

        #[command(flatten)]
        options: SearchOptions,
    },

    /// Replace matches across a directory tree
    ///
    /// Without --apply only a preview is printed.
    Replace {
        pattern: String,

        /// Replacement text; with --regex, `$1` and `${name}` refer to groups and `$$` is a literal `$`
        #[arg(long = "with", value_name = "TEMPLATE")]
        template: String,

        #[arg(value_name = "PATH", default_value = ".")]
        root: PathBuf,

        #[command(flatten)]
        options: SearchOptions,

        /// Write the changes
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Args, Debug)]
pub struct SearchOptions {
    /// Treat the pattern as a regular expression
    #[arg(short = 'r', long)]
    regex: bool,

    #[arg(short = 'c', long)]
    case_sensitive: bool,

    #[arg(short = 'w', long)]
    whole_word: bool,

    /// File globs to search, comma or semicolon separated (e.g. "*.py, *.{md,txt}")
    #[arg(long, value_name = "GLOBS")]
    include: Option<String>,

    /// Directory names to skip, comma or semicolon separated; replaces the configured list
    #[arg(long, value_name = "DIRS")]
    exclude: Option<String>,
}

impl SearchOptions {
    fn query(&self, pattern: &str) -> SearchQuery {
        let query = if self.regex {
            SearchQuery::regex(pattern)
        } else {
            SearchQuery::literal(pattern)
        };
        query
            .case_sensitive(self.case_sensitive)
            .whole_word(self.whole_word)
    }

    fn filter(&self, settings: &Settings) -> FileFilter {
        let mut filter = FileFilter::from_settings(&settings.search);
        if let Some(include) = self.include.as_deref() {
            filter = filter.with_include(FileFilter::parse_patterns(include));
        }
        if let Some(exclude) = self.exclude.as_deref() {
            let dirs = if exclude.trim().is_empty() {
                Vec::new()
            } else {
                FileFilter::parse_patterns(exclude)
            };
            filter = filter.with_exclude_dirs(dirs);
        }
        filter
    }
}

impl Cli {
    /// Runs the command; `Ok(false)` means it completed but found errors.
    pub fn execute(self) -> Result<bool, CliError> {
        let settings = match self.settings.as_deref() {
            Some(path) => load_settings_from(path)?,
            None => load_settings()?,
        };
        let runtime = AsyncRuntime::new(&settings.runtime).map_err(CliError::Runtime)?;
        let filter_settings = settings.clone();
        let (mut host, events) = IntelHost::new(
            runtime.tokio_handle(),
            Arc::new(LocalFileSystem::new()),
            settings,
        );

        match self.command {
            Command::Check { files } => check(&mut host, &events, &files),
            Command::Search {
                pattern,
                root,
                options,
            } => {
                let tree = search(
                    &mut host,
                    &events,
                    root,
                    options.query(&pattern),
                    options.filter(&filter_settings),
                )?;
                print_matches(&tree);
                Ok(true)
            }
            Command::Replace {
                pattern,
                template,
                root,
                options,
                apply,
            } => {
                let tree = search(
                    &mut host,
                    &events,
                    root,
                    options.query(&pattern),
                    options.filter(&filter_settings),
                )?;
                if apply {
                    apply_replace(&mut host, &template)
                } else {
                    let template = ReplaceTemplate::for_query(&options.query(&pattern), &template);
                    print_preview(&tree, &template);
                    Ok(true)
                }
            }
        }
    }
}

fn check(
    host: &mut IntelHost,
    events: &Receiver<HostEvent>,
    files: &[PathBuf],
) -> Result<bool, CliError> {
    let mut pending: Vec<(BufferId, PathBuf)> = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        let buffer = host.open_buffer(LanguageId::from_path(path), &text, Instant::now());
        host.analyze_now(buffer)?;
        pending.push((buffer, path.clone()));
    }

    let mut waiting: FxHashSet<BufferId> = pending.iter().map(|(b, _)| *b).collect();
    let mut clean = true;
    while !waiting.is_empty() {
        host.tick(Instant::now());
        let mut idle = true;
        while let Ok(event) = events.try_recv() {
            idle = false;
            match event {
                HostEvent::DiagnosticsUpdated { buffer, .. } => {
                    waiting.remove(&buffer);
                }
                HostEvent::AnalysisFailed { buffer, reason, .. } => {
                    waiting.remove(&buffer);
                    clean = false;
                    if let Some((_, path)) = pending.iter().find(|(b, _)| *b == buffer) {
                        eprintln!("{}: analysis failed: {reason}", path.display());
                    }
                }
                _ => {}
            }
        }
        if idle {
            std::thread::sleep(IDLE_SLEEP);
        }
    }

    for (buffer, path) in &pending {
        let (Some(snapshot), Some(published)) = (host.snapshot(*buffer), host.problems().get(*buffer))
        else {
            continue;
        };
        for diagnostic in published.diagnostics.iter() {
            let position = snapshot
                .index()
                .offset_to_position(diagnostic.span.start)
                .unwrap_or_default();
            println!(
                "{}:{}:{}: {}[{}]: {}",
                path.display(),
                position.line + 1,
                position.column + 1,
                diagnostic.severity,
                diagnostic.code,
                diagnostic.message
            );
            for hint in &diagnostic.fix {
                println!("    help: {}", hint.message);
            }
            if diagnostic.severity == Severity::Error {
                clean = false;
            }
        }
    }

    let counts = host.problems().counts();
    eprintln!(
        "{} error(s), {} warning(s), {} suggestion(s)",
        counts.errors, counts.warnings, counts.suggestions
    );
    Ok(clean)
}

fn search(
    host: &mut IntelHost,
    events: &Receiver<HostEvent>,
    root: PathBuf,
    query: SearchQuery,
    filter: FileFilter,
) -> Result<SearchTree, CliError> {
    let id = host.request_multi_file_search(root, query, filter)?;
    loop {
        host.tick(Instant::now());
        let mut idle = true;
        while let Ok(event) = events.try_recv() {
            idle = false;
            match event {
                HostEvent::MultiFileSearchComplete { query_id, outcome } if query_id == id => {
                    if outcome.partial {
                        eprintln!("search stopped early; results are partial");
                    }
                    return Ok(outcome.tree);
                }
                HostEvent::SearchFailed { query_id, reason } if query_id == id => {
                    return Err(CliError::Search(reason));
                }
                _ => {}
            }
        }
        if idle {
            std::thread::sleep(IDLE_SLEEP);
        }
    }
}

fn read_snapshot(path: &Path) -> Option<BufferSnapshot> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(BufferSnapshot::new(
        BufferId::new(0),
        LanguageId::from_path(path),
        &text,
    ))
}

fn print_matches(tree: &SearchTree) {
    for file in tree.files() {
        if let Some(error) = file.error.as_deref() {
            eprintln!("{}: {error}", file.path.display());
            continue;
        }
        let Some(snapshot) = read_snapshot(&file.path) else {
            continue;
        };
        for m in &file.matches {
            let line = snapshot
                .index()
                .line_span(m.line)
                .and_then(|(start, end)| snapshot.span(start, end).ok())
                .and_then(|span| snapshot.slice(&span).ok())
                .unwrap_or_default();
            println!("{}:{}:{}: {}", file.path.display(), m.line + 1, m.col + 1, line);
        }
    }
    eprintln!(
        "{} match(es) in {} file(s)",
        tree.match_count(),
        tree.file_count()
    );
}

fn print_preview(tree: &SearchTree, template: &ReplaceTemplate) {
    for file in tree.files() {
        if file.is_error() || file.matches.is_empty() {
            continue;
        }
        let Some(snapshot) = read_snapshot(&file.path) else {
            continue;
        };
        match replace::preview_all(&snapshot, &file.matches, template) {
            Ok(previews) => {
                for p in previews {
                    println!(
                        "{}:{}:{}: {} -> {}",
                        file.path.display(),
                        p.line + 1,
                        p.column + 1,
                        p.original,
                        p.replacement
                    );
                }
            }
            Err(e) => eprintln!("{}: {e}", file.path.display()),
        }
    }
}

fn apply_replace(host: &mut IntelHost, template: &str) -> Result<bool, CliError> {
    let outcomes = host.replace_in_files(template)?;
    let mut ok = true;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(count) => println!("{}: {count} replacement(s)", outcome.path.display()),
            Err(e) => {
                ok = false;
                eprintln!("{}: {e}", outcome.path.display());
            }
        }
    }
    Ok(ok)
}

#[cfg(test)]
#[path = "../tests/unit/cli.rs"]
mod tests;
