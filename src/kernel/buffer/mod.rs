//! Immutable buffer snapshots and the coordinate space derived from them.

mod coord;
mod snapshot;
mod span;

pub use coord::{Position, TextCoordinateIndex};
pub use snapshot::{BufferId, BufferSnapshot, Revision};
pub use span::Span;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextIndexError {
    #[error("offset {offset} out of range (len {len})")]
    OutOfRange { offset: usize, len: usize },
    #[error("position {line}:{column} out of range")]
    PositionOutOfRange { line: usize, column: usize },
    #[error("span {start}..{end} belongs to revision {span_revision}, snapshot is at {revision}")]
    StaleSpan {
        start: usize,
        end: usize,
        span_revision: Revision,
        revision: Revision,
    },
}
