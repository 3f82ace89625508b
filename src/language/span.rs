#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Shifts both ends by `offset`, used when a prefix of the source was
    /// stripped before lexing.
    pub fn shifted(self, offset: usize) -> Span {
        Span::new(self.start + offset, self.end + offset)
    }
}

/// 1-based line number of a byte offset.
pub fn line_of(source: &str, offset: usize) -> u32 {
    let offset = offset.min(source.len());
    let newlines = source.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count();
    newlines as u32 + 1
}
