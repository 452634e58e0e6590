//! Enclosing-scope navigation.
//!
//! One `type enclosing` query yields the nested scopes around the cursor,
//! innermost first. The navigator keeps that sequence plus a cursor that can
//! step outward and back. The cursor ranges over `[-1, len]`; both ends are
//! "off the sequence" positions where nothing is shown.

use merlin_types::{EnclosingFrame, Span};

#[derive(Debug, Clone)]
pub struct EnclosingNavigator {
    frames: Vec<EnclosingFrame>,
    current: isize,
}

impl Default for EnclosingNavigator {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            current: -1,
        }
    }
}

impl EnclosingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh sequence with the cursor before the first frame.
    pub fn replace(&mut self, frames: Vec<EnclosingFrame>) {
        self.frames = frames;
        self.current = -1;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn current_index(&self) -> isize {
        self.current
    }

    #[must_use]
    pub fn frames(&self) -> &[EnclosingFrame] {
        &self.frames
    }

    /// Move one scope outward. Returns the frame now under the cursor, or
    /// `None` once the cursor has run off the outer end.
    pub fn step_forward(&mut self) -> Option<EnclosingView> {
        let len = self.frames.len() as isize;
        if len == 0 {
            return None;
        }
        if self.current < len {
            self.current += 1;
        }
        self.view()
    }

    /// Move one scope inward. Returns the frame now under the cursor, or
    /// `None` once the cursor has run off the inner end.
    pub fn step_backward(&mut self) -> Option<EnclosingView> {
        if self.frames.is_empty() {
            return None;
        }
        if self.current >= 0 {
            self.current -= 1;
        }
        self.view()
    }

    fn view(&self) -> Option<EnclosingView> {
        let idx = usize::try_from(self.current).ok()?;
        self.frames.get(idx).map(|frame| EnclosingView {
            index: idx,
            type_description: frame.type_description.clone(),
            span: frame.span,
            highlight: Highlight::from_span(frame.span),
        })
    }
}

/// What stepping onto a frame shows: its type and where to highlight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingView {
    pub index: usize,
    pub type_description: String,
    pub span: Span,
    pub highlight: Highlight,
}

/// A column-bounded region repeated over a range of lines.
///
/// Lines are 1-based and inclusive; columns are 0-based, `start_col`
/// inclusive and `end_col` exclusive. `end_col == None` runs to end of line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub first_line: u32,
    pub last_line: u32,
    pub start_col: u32,
    pub end_col: Option<u32>,
}

/// Highlight for a span, expressed as rectangular single-line-range regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    regions: Vec<Region>,
}

impl Highlight {
    /// A single-line span is one region. A multi-line span becomes the tail
    /// of the start line, the full interior lines (if any), and the head of
    /// the end line.
    #[must_use]
    pub fn from_span(span: Span) -> Self {
        let (start, end) = (span.start, span.end);
        if span.is_single_line() {
            return Self {
                regions: vec![Region {
                    first_line: start.line,
                    last_line: end.line,
                    start_col: start.col,
                    end_col: Some(end.col),
                }],
            };
        }

        let mut regions = Vec::with_capacity(3);
        regions.push(Region {
            first_line: start.line,
            last_line: start.line,
            start_col: start.col,
            end_col: None,
        });
        if end.line > start.line + 1 {
            regions.push(Region {
                first_line: start.line + 1,
                last_line: end.line - 1,
                start_col: 0,
                end_col: None,
            });
        }
        regions.push(Region {
            first_line: end.line,
            last_line: end.line,
            start_col: 0,
            end_col: Some(end.col),
        });
        Self { regions }
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}
