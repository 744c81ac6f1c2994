//! Source positions.

/// A region of source text.
///
/// `start` / `end` are byte offsets into the file; `line` and `column`
/// are 1-based and describe `start`, which is what diagnostics report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, column: u32) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    /// Span covering both `self` and `other`, positioned at `self`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line: self.line,
            column: self.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_span_keeps_leading_position() {
        let a = Span::new(4, 6, 2, 3);
        let b = Span::new(10, 14, 2, 9);
        let joined = a.to(b);
        assert_eq!((joined.start, joined.end), (4, 14));
        assert_eq!((joined.line, joined.column), (2, 3));
    }
}
