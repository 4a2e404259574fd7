use std::fmt;

use oxrdf::{NamedOrBlankNode, Triple};

/// A location in the source document.
///
/// All fields are zero-based. `column` counts characters (not bytes)
/// from the start of the line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub byte: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(byte: usize, line: usize, column: usize) -> Self {
        Self { byte, line, column }
    }

    /// Shifts a position that is relative to some embedded text so that it
    /// becomes relative to the outer document the text was taken from.
    pub(crate) fn offset_by(self, origin: Position) -> Position {
        Position {
            byte: self.byte + origin.byte,
            column: if self.line == 0 {
                self.column + origin.column
            } else {
                self.column
            },
            line: self.line + origin.line,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // humans count from one
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A half-open range of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    pub fn len(&self) -> usize {
        self.end.byte - self.start.byte
    }

    pub fn is_empty(&self) -> bool {
        self.start.byte == self.end.byte
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Source locations of the terms of a [`Statement`], where known.
///
/// A literal taken from text content covers exactly that text when it
/// appears verbatim in the source. Text gathered from several nodes, or
/// containing character references, covers the element's inner markup
/// instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TextOffsets {
    pub subject: Option<TextRange>,
    pub predicate: Option<TextRange>,
    pub object: Option<TextRange>,
}

/// Groups the statements that describe one top-level item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container(pub NamedOrBlankNode);

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An extracted triple, plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub triple: Triple,
    /// Only present when the document was parsed with offset capture enabled.
    pub offsets: Option<TextOffsets>,
    pub container: Option<Container>,
}

impl Statement {
    pub fn new(triple: Triple) -> Self {
        Self {
            triple,
            offsets: None,
            container: None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.triple.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_by_only_moves_first_line_columns() {
        let origin = Position::new(100, 4, 10);
        assert_eq!(
            Position::new(3, 0, 3).offset_by(origin),
            Position::new(103, 4, 13)
        );
        assert_eq!(
            Position::new(30, 2, 3).offset_by(origin),
            Position::new(130, 6, 3)
        );
    }
}
