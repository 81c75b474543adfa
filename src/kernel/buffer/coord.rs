use super::span::Span;
use super::TextIndexError;
use ropey::Rope;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Offset <-> (line, column) table for one snapshot.
///
/// Offsets and columns count characters. `\n`, `\r\n` and a lone `\r` all terminate a
/// line. Built once in O(n); lookups are a binary search over line starts.
#[derive(Debug, Clone)]
pub struct TextCoordinateIndex {
    line_starts: Vec<usize>,
    // content end of each line, terminator excluded
    line_ends: Vec<usize>,
    len_chars: usize,
}

impl TextCoordinateIndex {
    pub fn build(rope: &Rope) -> Self {
        let mut line_starts = vec![0usize];
        let mut line_ends = Vec::new();
        let mut prev_cr = false;
        let mut idx = 0usize;

        for ch in rope.chars() {
            match ch {
                '\n' => {
                    line_ends.push(if prev_cr { idx - 1 } else { idx });
                    line_starts.push(idx + 1);
                    prev_cr = false;
                }
                '\r' => {
                    if prev_cr {
                        line_ends.push(idx - 1);
                        line_starts.push(idx);
                    }
                    prev_cr = true;
                }
                _ => {
                    if prev_cr {
                        line_ends.push(idx - 1);
                        line_starts.push(idx);
                    }
                    prev_cr = false;
                }
            }
            idx += 1;
        }

        if prev_cr {
            line_ends.push(idx - 1);
            line_starts.push(idx);
        }
        line_ends.push(idx);

        debug_assert_eq!(line_starts.len(), line_ends.len());
        Self {
            line_starts,
            line_ends,
            len_chars: idx,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::build(&Rope::from_str(text))
    }

    pub fn len_chars(&self) -> usize {
        self.len_chars
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn offset_to_position(&self, offset: usize) -> Result<Position, TextIndexError> {
        if offset > self.len_chars {
            return Err(TextIndexError::OutOfRange {
                offset,
                len: self.len_chars,
            });
        }
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        Ok(Position::new(line, offset - self.line_starts[line]))
    }

    pub fn position_to_offset(&self, line: usize, column: usize) -> Result<usize, TextIndexError> {
        let (Some(&start), Some(&end)) = (self.line_starts.get(line), self.line_ends.get(line))
        else {
            return Err(TextIndexError::PositionOutOfRange { line, column });
        };
        if start + column > end {
            return Err(TextIndexError::PositionOutOfRange { line, column });
        }
        Ok(start + column)
    }

    /// Content range of `line` without its terminator.
    pub fn line_span(&self, line: usize) -> Option<(usize, usize)> {
        Some((*self.line_starts.get(line)?, *self.line_ends.get(line)?))
    }

    pub fn span_to_range(&self, span: &Span) -> Result<(Position, Position), TextIndexError> {
        Ok((
            self.offset_to_position(span.start)?,
            self.offset_to_position(span.end)?,
        ))
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/kernel/buffer/coord.rs"]
mod tests;
