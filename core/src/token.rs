//! Located tokens produced by the lexer.

use core::fmt;

use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position within the logical document.
///
/// `offset` counts characters (Unicode scalar values) from the start of the
/// document, not bytes. `line` and `column` are 1-based; `column` resets to 1
/// after every newline, and a CRLF pair advances `line` by exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// The start of a document: line 1, column 1, offset 0.
    pub const START: Self = Self {
        line: 1,
        column: 1,
        offset: 0,
    };

    /// Advance past one character.
    pub(crate) fn advance(&mut self, ch: char) {
        self.offset += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    #[inline]
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

/// The source extent of a token.
///
/// The half-open interval `[start, end)` covers the token's span.
/// `row_number` is the 1-based index of the logical record the token belongs
/// to; it advances only when a record delimiter is emitted, and the delimiter
/// itself carries the number of the row it terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    pub start: Position,
    pub end: Position,
    pub row_number: usize,
}

/// One lexical unit of a CSV document.
///
/// Field values are fully decoded: quotes stripped, doubled quotes collapsed
/// to one, embedded newlines preserved verbatim. Delimiter tokens carry the
/// exact characters consumed (`","`-style for field delimiters, `"\n"` or
/// `"\r\n"` for record delimiters).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "kebab-case"))]
pub enum Token {
    Field { value: String, location: Location },
    FieldDelimiter { value: String, location: Location },
    RecordDelimiter { value: String, location: Location },
}

impl Token {
    /// The decoded token text.
    pub fn value(&self) -> &str {
        match self {
            Token::Field { value, .. }
            | Token::FieldDelimiter { value, .. }
            | Token::RecordDelimiter { value, .. } => value,
        }
    }

    /// Where the token came from.
    pub fn location(&self) -> &Location {
        match self {
            Token::Field { location, .. }
            | Token::FieldDelimiter { location, .. }
            | Token::RecordDelimiter { location, .. } => location,
        }
    }
}

/// An assembled record: header-field name to captured value.
///
/// Key order follows the header row. Arbitrary strings are valid keys; names
/// like `__proto__` are plain map entries with no special meaning.
pub type Record = IndexMap<String, String>;
