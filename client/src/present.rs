//! Editor-neutral presentation of server results.
//!
//! Everything here is a pure conversion; editor glue decides how to show it.
//! [`Presenter`] names the slots an editor fills, and [`TextPresenter`] is
//! the line-oriented rendition used by the command-line driver.

use std::fmt::Write as _;
use std::io::{self, Write};

use merlin_types::{CompletionEntry, ErrorKind, ErrorReport};
use serde::Serialize;

use crate::enclosing::{EnclosingView, Highlight, Region};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionItem {
    pub word: String,
    pub menu: String,
    pub info: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierCandidate {
    pub word: String,
    pub abbr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationKind {
    Error,
    Warning,
}

impl LocationKind {
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Error => 'e',
            Self::Warning => 'w',
        }
    }
}

/// One location-list entry. `lnum` and `col` are both 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub lnum: u32,
    pub col: u32,
    pub nr: usize,
    pub text: String,
    pub kind: LocationKind,
}

#[must_use]
pub fn completion_items(entries: &[CompletionEntry]) -> Vec<CompletionItem> {
    entries
        .iter()
        .map(|entry| CompletionItem {
            word: entry.name.clone(),
            menu: squash_whitespace(&entry.desc),
            info: entry.info.clone(),
            kind: entry.kind.chars().take(1).collect(),
        })
        .collect()
}

/// Candidates for a fuzzy identifier finder: `abbr` is `"<kind>: <name>"`.
#[must_use]
pub fn identifier_candidates(entries: &[CompletionEntry]) -> Vec<IdentifierCandidate> {
    entries
        .iter()
        .map(|entry| IdentifierCandidate {
            word: entry.name.clone(),
            abbr: format!("{}: {}", entry.kind, entry.name),
        })
        .collect()
}

#[must_use]
pub fn location_list(errors: &[ErrorReport], ignore_warnings: bool) -> Vec<Location> {
    errors
        .iter()
        .filter(|e| !(ignore_warnings && e.kind == ErrorKind::Warning))
        .enumerate()
        .map(|(nr, e)| {
            let (lnum, col) = e.start.map_or((1, 1), |start| (start.line, start.col + 1));
            Location {
                lnum,
                col,
                nr,
                text: e.message.replace('\n', " "),
                kind: if e.kind.is_error() {
                    LocationKind::Error
                } else {
                    LocationKind::Warning
                },
            }
        })
        .collect()
}

/// Newlines become spaces and runs of spaces collapse to one.
fn squash_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars().map(|c| if c == '\n' { ' ' } else { c }) {
        if ch == ' ' && out.ends_with(' ') {
            continue;
        }
        out.push(ch);
    }
    out
}

impl Region {
    /// Vim pattern atoms matching this region.
    #[must_use]
    pub fn to_pattern(&self) -> String {
        let mut pat = String::new();
        if self.first_line > 0 {
            let _ = write!(pat, r"\%>{}l", self.first_line - 1);
        }
        if self.start_col > 0 {
            let _ = write!(pat, r"\%>{}c", self.start_col);
        }
        let _ = write!(pat, r"\%<{}l", self.last_line + 1);
        if let Some(end) = self.end_col {
            let _ = write!(pat, r"\%<{}c", end + 1);
        }
        pat
    }
}

impl Highlight {
    /// Vim `matchadd` pattern covering every region.
    #[must_use]
    pub fn to_pattern(&self) -> String {
        self.regions()
            .iter()
            .map(Region::to_pattern)
            .collect::<Vec<_>>()
            .join(r"\|")
    }
}

/// Output slots an editor integration provides.
pub trait Presenter {
    fn completions(&mut self, items: &[CompletionItem]) -> io::Result<()>;
    fn identifiers(&mut self, items: &[IdentifierCandidate]) -> io::Result<()>;
    fn locations(&mut self, items: &[Location]) -> io::Result<()>;
    fn highlight(&mut self, view: &EnclosingView) -> io::Result<()>;
    fn packages(&mut self, names: &[String]) -> io::Result<()>;
    fn message(&mut self, text: &str) -> io::Result<()>;
}

/// Plain-text presenter, one record per line.
pub struct TextPresenter<W> {
    out: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn completions(&mut self, items: &[CompletionItem]) -> io::Result<()> {
        for item in items {
            writeln!(self.out, "{}\t{}\t{}", item.kind, item.word, item.menu)?;
        }
        Ok(())
    }

    fn identifiers(&mut self, items: &[IdentifierCandidate]) -> io::Result<()> {
        for item in items {
            writeln!(self.out, "{}", item.abbr)?;
        }
        Ok(())
    }

    fn locations(&mut self, items: &[Location]) -> io::Result<()> {
        for loc in items {
            writeln!(
                self.out,
                "{}:{}: {}: {}",
                loc.lnum,
                loc.col,
                loc.kind.code(),
                loc.text
            )?;
        }
        Ok(())
    }

    fn highlight(&mut self, view: &EnclosingView) -> io::Result<()> {
        writeln!(
            self.out,
            "{}-{}\t{}\t{}",
            view.span.start,
            view.span.end,
            view.type_description,
            view.highlight.to_pattern()
        )
    }

    fn packages(&mut self, names: &[String]) -> io::Result<()> {
        for name in names {
            writeln!(self.out, "{name}")?;
        }
        Ok(())
    }

    fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }
}
