use std::fmt;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for convenience
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., the opening and closing paren of a form)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
