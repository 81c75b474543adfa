//! Snapshot-to-snapshot replacement.
//!
//! Nothing here edits text in place: every call takes a snapshot and either returns its
//! successor or an error, leaving the input untouched.

use crate::kernel::buffer::{BufferId, BufferSnapshot, Span, TextIndexError};
use crate::kernel::language::LanguageId;
use crate::kernel::services::ports::{
    content_fingerprint, FileSearchResult, FileSystem, SearchMatch, SearchQuery,
};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplaceError {
    #[error("stale match set: {0}")]
    StaleMatchSet(String),
    #[error("matches overlap at {first_start}..{first_end} and {second_start}..{second_end}")]
    OverlappingMatches {
        first_start: usize,
        first_end: usize,
        second_start: usize,
        second_end: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ReplaceError {
    fn stale(index: usize, err: TextIndexError) -> Self {
        Self::StaleMatchSet(format!("match {index}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ReplaceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
}

/// Replacement text with `$n`, `${n}`, `${name}`, `$name` references; `$$` is a literal `$`.
/// A bare `$name` runs over `[_A-Za-z0-9]`.
///
/// Only regex queries get reference expansion; see [`ReplaceTemplate::for_query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceTemplate {
    pieces: Vec<Piece>,
}

impl ReplaceTemplate {
    pub fn parse(template: &str) -> Self {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut it = template.chars().peekable();

        while let Some(ch) = it.next() {
            if ch != '$' {
                literal.push(ch);
                continue;
            }
            let reference = match it.peek().copied() {
                Some('$') => {
                    it.next();
                    literal.push('$');
                    continue;
                }
                Some('{') => {
                    let rest: String = it.clone().skip(1).take_while(|c| *c != '}').collect();
                    let closed = it.clone().nth(1 + rest.chars().count()) == Some('}');
                    if !closed || rest.is_empty() {
                        None
                    } else {
                        for _ in 0..rest.chars().count() + 2 {
                            it.next();
                        }
                        Some(match rest.parse::<usize>() {
                            Ok(index) => Piece::Group(index),
                            Err(_) => Piece::Named(rest),
                        })
                    }
                }
                Some(c) if c.is_ascii_digit() => {
                    let mut digits = String::new();
                    while let Some(d) = it.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        it.next();
                    }
                    digits.parse::<usize>().ok().map(Piece::Group)
                }
                Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(n) = it
                        .peek()
                        .copied()
                        .filter(|n| *n == '_' || n.is_ascii_alphanumeric())
                    {
                        name.push(n);
                        it.next();
                    }
                    Some(Piece::Named(name))
                }
                _ => None,
            };

            match reference {
                Some(piece) => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(piece);
                }
                None => literal.push('$'),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Self { pieces }
    }

    /// Regex queries expand references; literal queries insert `text` verbatim.
    pub fn for_query(query: &SearchQuery, text: &str) -> Self {
        if query.is_regex {
            Self::parse(text)
        } else {
            Self::literal(text)
        }
    }

    /// Template whose text is inserted verbatim.
    pub fn literal(text: &str) -> Self {
        let pieces = if text.is_empty() {
            Vec::new()
        } else {
            vec![Piece::Literal(text.to_string())]
        };
        Self { pieces }
    }

    pub fn has_references(&self) -> bool {
        self.pieces.iter().any(|p| !matches!(p, Piece::Literal(_)))
    }

    pub fn expand(&self, m: &SearchMatch, matched: &str) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Group(0) => out.push_str(
                    m.captures
                        .as_ref()
                        .and_then(|c| c.get(0))
                        .unwrap_or(matched),
                ),
                Piece::Group(index) => {
                    if let Some(text) = m.captures.as_ref().and_then(|c| c.get(*index)) {
                        out.push_str(text);
                    }
                }
                Piece::Named(name) => {
                    if let Some(text) = m.captures.as_ref().and_then(|c| c.name(name)) {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePreview {
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub original: String,
    pub replacement: String,
}

pub fn replace_one(
    snapshot: &BufferSnapshot,
    m: &SearchMatch,
    replacement: &str,
) -> Result<BufferSnapshot> {
    snapshot
        .edit(&m.span, replacement)
        .map_err(|e| ReplaceError::stale(0, e))
}

/// Validated replacements ordered by ascending start.
fn plan(
    snapshot: &BufferSnapshot,
    matches: &[SearchMatch],
    template: &ReplaceTemplate,
) -> Result<Vec<ReplacePreview>> {
    let mut planned = Vec::with_capacity(matches.len());
    for (index, m) in matches.iter().enumerate() {
        let original = snapshot
            .slice(&m.span)
            .map_err(|e| ReplaceError::stale(index, e))?;
        let position = snapshot
            .index()
            .offset_to_position(m.span.start)
            .map_err(|e| ReplaceError::stale(index, e))?;
        let replacement = template.expand(m, &original);
        planned.push(ReplacePreview {
            span: m.span,
            line: position.line,
            column: position.column,
            original,
            replacement,
        });
    }

    planned.sort_by_key(|p| (p.span.start, p.span.end));
    for pair in planned.windows(2) {
        let (a, b) = (&pair[0].span, &pair[1].span);
        if a.end > b.start || a.start == b.start {
            return Err(ReplaceError::OverlappingMatches {
                first_start: a.start,
                first_end: a.end,
                second_start: b.start,
                second_end: b.end,
            });
        }
    }
    Ok(planned)
}

/// What `replace_all` would do, without producing a revision.
pub fn preview_all(
    snapshot: &BufferSnapshot,
    matches: &[SearchMatch],
    template: &ReplaceTemplate,
) -> Result<Vec<ReplacePreview>> {
    plan(snapshot, matches, template)
}

/// Replaces every match in one pass, yielding exactly one successor revision.
///
/// All spans are validated before any text changes; one stale or out-of-range span fails the
/// whole call. An empty match set returns the snapshot unchanged.
pub fn replace_all(
    snapshot: &BufferSnapshot,
    matches: &[SearchMatch],
    template: &ReplaceTemplate,
) -> Result<BufferSnapshot> {
    let planned = plan(snapshot, matches, template)?;
    if planned.is_empty() {
        return Ok(snapshot.clone());
    }

    let mut rope = snapshot.rope().clone();
    for p in planned.iter().rev() {
        rope.remove(p.span.start..p.span.end);
        rope.insert(p.span.start, &p.replacement);
    }
    Ok(snapshot.successor(rope))
}

#[derive(Debug)]
pub struct FileReplaceOutcome {
    pub path: PathBuf,
    /// Number of replacements written, or why the file was left alone.
    pub result: Result<usize>,
}

impl FileReplaceOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Applies `replace_all` to each searched file independently.
///
/// A file whose content no longer matches the fingerprint taken at search time fails with
/// `StaleMatchSet`. Failures never roll back files already written. Entries without matches
/// or with a read error are skipped.
pub fn replace_in_files<'a>(
    fs: &dyn FileSystem,
    results: impl IntoIterator<Item = &'a FileSearchResult>,
    template: &ReplaceTemplate,
) -> Vec<FileReplaceOutcome> {
    results
        .into_iter()
        .filter(|r| !r.is_error() && !r.matches.is_empty())
        .map(|r| {
            let result = replace_file(fs, r, template);
            match &result {
                Ok(count) => tracing::info!(path = %r.path.display(), count, "file rewritten"),
                Err(e) => tracing::warn!(path = %r.path.display(), error = %e, "file replace failed"),
            }
            FileReplaceOutcome {
                path: r.path.clone(),
                result,
            }
        })
        .collect()
}

fn replace_file(
    fs: &dyn FileSystem,
    entry: &FileSearchResult,
    template: &ReplaceTemplate,
) -> Result<usize> {
    let bytes = fs.read_file(&entry.path)?;
    if content_fingerprint(&bytes) != entry.fingerprint {
        return Err(ReplaceError::StaleMatchSet(
            "file changed since it was searched".to_string(),
        ));
    }
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let snapshot = BufferSnapshot::new(BufferId::new(0), LanguageId::from_path(&entry.path), text);
    let replaced = replace_all(&snapshot, &entry.matches, template)?;
    fs.write_file(&entry.path, replaced.text().as_bytes())?;
    Ok(entry.matches.len())
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/replace.rs"]
mod tests;
