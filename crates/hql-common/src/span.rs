use serde::Serialize;

/// Byte-offset span into a single source file. Start is inclusive, end exclusive.
///
/// All intra-file positions in the compiler are tracked as byte offsets;
/// line/column information is computed on demand via [`LineIndex`] only when
/// needed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Pre-computed index of line start positions for on-demand byte-offset to
/// (line, column) conversion.
///
/// Constructed once per source file, then used by every later stage to
/// resolve a [`Span`] into a human-readable [`crate::position::Position`].
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    /// A `\r\n` pair is treated as a single line break (the `\r` does not
    /// start a new line on its own).
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = self.line_starts.partition_point(|&start| start <= offset);
        let line_idx = line_idx.saturating_sub(1);
        let line = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Byte offset of the start of the given 1-based line, or `None` if out
    /// of range.
    pub fn line_start(&self, line: u32) -> Option<u32> {
        self.line_starts.get((line as usize).checked_sub(1)?).copied()
    }

    /// Byte offset just past the end of the given 1-based line, not
    /// including its trailing newline.
    pub fn line_end(&self, line: u32, source: &str) -> Option<u32> {
        let start = self.line_start(line)?;
        let next_start = self
            .line_starts
            .get(line as usize)
            .copied()
            .unwrap_or(source.len() as u32);
        let mut end = next_start;
        let bytes = source.as_bytes();
        while end > start && (bytes[end as usize - 1] == b'\n' || bytes[end as usize - 1] == b'\r')
        {
            end -= 1;
        }
        Some(end)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_and_len() {
        let span = Span::new(5, 10);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
    }

    #[test]
    fn span_merge() {
        let a = Span::new(5, 10);
        let b = Span::new(8, 15);
        let merged = a.merge(b);
        assert_eq!(merged.start, 5);
        assert_eq!(merged.end, 15);
    }

    #[test]
    fn line_index_multiple_lines() {
        let src = "hello\nworld\nfoo";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(6), (2, 1));
        assert_eq!(idx.line_col(13), (3, 2));
    }

    #[test]
    fn line_index_line_bounds() {
        let src = "abc\ndef\nghi";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_start(2), Some(4));
        assert_eq!(idx.line_end(1, src), Some(3));
        assert_eq!(idx.line_end(2, src), Some(7));
    }
}
