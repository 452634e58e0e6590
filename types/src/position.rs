//! Buffer coordinates shared by every protocol call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A cursor-equivalent coordinate: 1-based line, 0-based character column.
///
/// Serialized as `{"line": n, "col": n}`, the shape the analysis server expects.
/// Ordering is by line, then column. No normalization is applied beyond what the
/// server itself performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Start of the given line.
    #[must_use]
    pub const fn line_start(line: u32) -> Self {
        Self { line, col: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid position '{input}': expected LINE:COL with LINE >= 1")]
pub struct ParsePositionError {
    input: String,
}

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePositionError {
            input: s.to_string(),
        };
        let (line, col) = s.split_once(':').ok_or_else(err)?;
        let line: u32 = line.trim().parse().map_err(|_| err())?;
        let col: u32 = col.trim().parse().map_err(|_| err())?;
        if line == 0 {
            return Err(err());
        }
        Ok(Self { line, col })
    }
}

/// Half-open region in line/column space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}
