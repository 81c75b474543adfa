//! 单缓冲区匹配器
//!
//! - Literal 区分大小写：memchr Finder
//! - Literal 忽略大小写 / Regex：regex crate（literal 先 escape）
//! - 全词匹配：命中后检查两侧字符，不满足则从下一个字符重试
//!
//! 偏移统一换算成字符偏移（与 Span 一致）

use crate::kernel::buffer::{BufferSnapshot, Span};
use crate::kernel::services::ports::search::{
    MatchCaptures, Result, SearchMatch, SearchQuery, SearchScope,
};
use crate::kernel::services::ports::settings::{is_word_char, SearchSettings};
use crate::kernel::task::CancelToken;
use memchr::memmem::Finder;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Matcher steps between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

type RawMatch = (usize, usize, Option<MatchCaptures>);

#[derive(Clone)]
enum Matcher {
    Literal { finder: Finder<'static> },
    Regex {
        regex: Regex,
        names: Arc<[Option<String>]>,
        expose_captures: bool,
    },
}

/// Compiled form of a [`SearchQuery`]; compile once, run against many snapshots.
#[derive(Clone)]
pub struct Searcher {
    query: SearchQuery,
    matcher: Option<Matcher>,
    extra_word_chars: Arc<str>,
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("query", &self.query)
            .field("empty", &self.matcher.is_none())
            .finish()
    }
}

impl Searcher {
    /// Fails with `InvalidPattern` when a regex query does not compile.
    pub fn new(query: &SearchQuery, settings: &SearchSettings) -> Result<Self> {
        let matcher = if query.pattern.is_empty() {
            None
        } else if query.is_regex {
            let regex = RegexBuilder::new(&query.pattern)
                .case_insensitive(!query.case_sensitive)
                .multi_line(true)
                .build()?;
            let names = regex
                .capture_names()
                .map(|n| n.map(str::to_string))
                .collect();
            Some(Matcher::Regex {
                regex,
                names,
                expose_captures: true,
            })
        } else if query.case_sensitive {
            Some(Matcher::Literal {
                finder: Finder::new(query.pattern.as_bytes()).into_owned(),
            })
        } else {
            let regex = RegexBuilder::new(&regex::escape(&query.pattern))
                .case_insensitive(true)
                .build()?;
            Some(Matcher::Regex {
                regex,
                names: Arc::from(Vec::new()),
                expose_captures: false,
            })
        };

        Ok(Self {
            query: query.clone(),
            matcher,
            extra_word_chars: Arc::from(settings.extra_word_chars.as_str()),
        })
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// All matches in `snapshot`, ordered by start offset.
    pub fn search(&self, snapshot: &BufferSnapshot) -> Result<Vec<SearchMatch>> {
        Ok(self
            .search_cancellable(snapshot, &CancelToken::new())?
            .unwrap_or_default())
    }

    /// `Ok(None)` when `cancel` fired before the scan finished.
    pub fn search_cancellable(
        &self,
        snapshot: &BufferSnapshot,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<SearchMatch>>> {
        let Some(matcher) = &self.matcher else {
            return Ok(Some(Vec::new()));
        };

        let text = snapshot.text();
        let rope = snapshot.rope();
        let (start_byte, end_byte) = match self.query.scope {
            SearchScope::Buffer => (0, text.len()),
            SearchScope::Selection(selection) => {
                snapshot.check_span(&selection)?;
                (
                    rope.char_to_byte(selection.start),
                    rope.char_to_byte(selection.end),
                )
            }
        };

        let Some(raw) = self.scan(matcher, &text, start_byte, end_byte, || cancel.is_cancelled())
        else {
            return Ok(None);
        };
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let index = snapshot.index();
        let revision = snapshot.revision();
        let mut chars = ByteToChar::new(&text);
        let mut matches = Vec::with_capacity(raw.len());
        for (s, e, captures) in raw {
            let start = chars.advance(s);
            let end = chars.advance(e);
            let position = index.offset_to_position(start)?;
            let mut m = SearchMatch::new(
                Span::new(revision, start, end),
                position.line,
                position.column,
            );
            if let Some(captures) = captures {
                m = m.with_captures(captures);
            }
            matches.push(m);
        }
        Ok(Some(matches))
    }

    /// Raw byte-offset hits in `text[start..end]`; `None` once `cancelled` reports true.
    ///
    /// Cancellation is polled every `CANCEL_CHECK_INTERVAL` matcher steps, counting hits that
    /// the whole-word filter rejects.
    fn scan(
        &self,
        matcher: &Matcher,
        text: &str,
        start: usize,
        end: usize,
        mut cancelled: impl FnMut() -> bool,
    ) -> Option<Vec<RawMatch>> {
        let mut raw = Vec::new();
        let mut pos = start;
        let mut steps = 0usize;
        while pos < end {
            if steps % CANCEL_CHECK_INTERVAL == 0 && cancelled() {
                return None;
            }
            steps += 1;

            let Some((s, e, captures)) = matcher.find_at(&text[..end], pos) else {
                break;
            };
            if s == e {
                pos = next_char_boundary(text, e);
                continue;
            }
            if self.query.whole_word && !self.is_whole_word(text, s, e) {
                pos = next_char_boundary(text, s);
                continue;
            }
            raw.push((s, e, captures));
            pos = e;
        }
        Some(raw)
    }

    fn is_whole_word(&self, text: &str, start: usize, end: usize) -> bool {
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(|c| self.is_word_char(c))
            && !after.is_some_and(|c| self.is_word_char(c))
    }

    fn is_word_char(&self, ch: char) -> bool {
        is_word_char(ch, &self.extra_word_chars)
    }
}

impl Matcher {
    fn find_at(&self, haystack: &str, pos: usize) -> Option<(usize, usize, Option<MatchCaptures>)> {
        match self {
            Matcher::Literal { finder } => {
                let found = finder.find(&haystack.as_bytes()[pos..])?;
                let start = pos + found;
                Some((start, start + finder.needle().len(), None))
            }
            Matcher::Regex {
                regex,
                expose_captures: false,
                ..
            } => {
                let m = regex.find_at(haystack, pos)?;
                Some((m.start(), m.end(), None))
            }
            Matcher::Regex { regex, names, .. } => {
                let caps = regex.captures_at(haystack, pos)?;
                let whole = caps.get(0)?;
                let groups = caps
                    .iter()
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect();
                Some((
                    whole.start(),
                    whole.end(),
                    Some(MatchCaptures::new(groups, names.clone())),
                ))
            }
        }
    }
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}

/// Byte to char offset conversion for monotonically increasing byte offsets.
struct ByteToChar<'a> {
    text: &'a str,
    byte: usize,
    char: usize,
}

impl<'a> ByteToChar<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            char: 0,
        }
    }

    fn advance(&mut self, byte: usize) -> usize {
        debug_assert!(byte >= self.byte);
        self.char += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.char
    }
}

/// One-shot convenience over [`Searcher`].
pub fn search(
    snapshot: &BufferSnapshot,
    query: &SearchQuery,
    settings: &SearchSettings,
) -> Result<Vec<SearchMatch>> {
    Searcher::new(query, settings)?.search(snapshot)
}

#[cfg(test)]
#[path = "../../../../../tests/unit/kernel/services/adapters/search/searcher.rs"]
mod tests;
