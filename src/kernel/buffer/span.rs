use super::snapshot::{BufferSnapshot, Revision};

/// Half-open `[start, end)` character range, only meaningful for the revision it was
/// computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub revision: Revision,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(revision: Revision, start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} > end {end}");
        Self {
            revision,
            start,
            end,
        }
    }

    pub fn empty(revision: Revision, offset: usize) -> Self {
        Self::new(revision, offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// A span is valid for a snapshot only when it was computed against that exact revision
    /// and still lies inside the text.
    pub fn is_valid_for(&self, snapshot: &BufferSnapshot) -> bool {
        self.revision == snapshot.revision()
            && self.start <= self.end
            && self.end <= snapshot.len_chars()
    }
}
