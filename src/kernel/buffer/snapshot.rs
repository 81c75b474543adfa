use super::coord::TextCoordinateIndex;
use super::span::Span;
use super::TextIndexError;
use crate::kernel::language::LanguageId;
use ropey::Rope;
use std::fmt;
use std::sync::{Arc, OnceLock};

pub type Revision = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

impl BufferId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// One immutable version of a buffer.
///
/// Cloning is cheap (shared `Arc`). An edit never touches an existing snapshot; it produces
/// a successor with `revision + 1`. The coordinate index and the flat text are derived
/// lazily on first use and shared by every clone.
#[derive(Clone)]
pub struct BufferSnapshot {
    inner: Arc<SnapshotInner>,
}

struct SnapshotInner {
    buffer: BufferId,
    revision: Revision,
    language: LanguageId,
    rope: Rope,
    text: OnceLock<Arc<str>>,
    index: OnceLock<TextCoordinateIndex>,
}

impl BufferSnapshot {
    pub fn new(buffer: BufferId, language: LanguageId, text: &str) -> Self {
        Self::from_rope(buffer, 0, language, Rope::from_str(text))
    }

    pub fn from_rope(buffer: BufferId, revision: Revision, language: LanguageId, rope: Rope) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                buffer,
                revision,
                language,
                rope,
                text: OnceLock::new(),
                index: OnceLock::new(),
            }),
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.inner.buffer
    }

    pub fn revision(&self) -> Revision {
        self.inner.revision
    }

    pub fn language(&self) -> LanguageId {
        self.inner.language
    }

    pub fn rope(&self) -> &Rope {
        &self.inner.rope
    }

    pub fn len_chars(&self) -> usize {
        self.inner.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    pub fn text(&self) -> Arc<str> {
        self.inner
            .text
            .get_or_init(|| Arc::from(self.inner.rope.to_string()))
            .clone()
    }

    pub fn index(&self) -> &TextCoordinateIndex {
        self.inner
            .index
            .get_or_init(|| TextCoordinateIndex::build(&self.inner.rope))
    }

    pub fn full_span(&self) -> Span {
        Span::new(self.revision(), 0, self.len_chars())
    }

    pub fn span(&self, start: usize, end: usize) -> Result<Span, TextIndexError> {
        let len = self.len_chars();
        if start > end || end > len {
            return Err(TextIndexError::OutOfRange {
                offset: start.max(end),
                len,
            });
        }
        Ok(Span::new(self.revision(), start, end))
    }

    pub fn check_span(&self, span: &Span) -> Result<(), TextIndexError> {
        if span.revision != self.revision() {
            return Err(TextIndexError::StaleSpan {
                start: span.start,
                end: span.end,
                span_revision: span.revision,
                revision: self.revision(),
            });
        }
        if span.start > span.end || span.end > self.len_chars() {
            return Err(TextIndexError::OutOfRange {
                offset: span.end,
                len: self.len_chars(),
            });
        }
        Ok(())
    }

    pub fn slice(&self, span: &Span) -> Result<String, TextIndexError> {
        self.check_span(span)?;
        Ok(self.inner.rope.slice(span.start..span.end).to_string())
    }

    /// Whole-text replacement, as delivered by a change event.
    pub fn with_text(&self, text: &str) -> Self {
        self.successor(Rope::from_str(text))
    }

    pub fn edit(&self, span: &Span, text: &str) -> Result<Self, TextIndexError> {
        self.check_span(span)?;
        let mut rope = self.inner.rope.clone();
        rope.remove(span.start..span.end);
        rope.insert(span.start, text);
        Ok(self.successor(rope))
    }

    pub(crate) fn successor(&self, rope: Rope) -> Self {
        Self::from_rope(self.buffer(), self.revision() + 1, self.language(), rope)
    }
}

impl fmt::Debug for BufferSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferSnapshot")
            .field("buffer", &self.inner.buffer)
            .field("revision", &self.inner.revision)
            .field("language", &self.inner.language)
            .field("len_chars", &self.len_chars())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/buffer/snapshot.rs"]
mod tests;
