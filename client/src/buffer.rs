//! Editor buffer seam.
//!
//! The sync tracker only needs three things from an editor: the buffer's
//! lines and name, a content-identity checkpoint, and the earliest position
//! edited since a checkpoint. [`MemoryBuffer`] implements the seam for the
//! command-line driver and tests.

use merlin_types::{BufferId, Position};

/// Content-identity token for "this buffer as of some edit count".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    buffer: BufferId,
    revision: u64,
}

impl Checkpoint {
    #[must_use]
    pub fn new(buffer: BufferId, revision: u64) -> Self {
        Self { buffer, revision }
    }

    #[must_use]
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

pub trait EditorBuffer {
    fn id(&self) -> BufferId;

    /// Full name (path) of the buffer; only the basename is sent to the server.
    fn name(&self) -> &str;

    fn lines(&self) -> &[String];

    /// Checkpoint describing the buffer as it is now.
    fn checkpoint(&self) -> Checkpoint;

    /// Earliest position modified after `checkpoint` was taken, or `None` if
    /// the buffer is untouched since then.
    fn changed_since(&self, checkpoint: &Checkpoint) -> Option<Position>;

    fn line_count(&self) -> usize {
        self.lines().len()
    }

    /// Basename of [`EditorBuffer::name`].
    fn basename(&self) -> &str {
        let name = self.name();
        name.rsplit(['/', '\\']).next().unwrap_or(name)
    }
}

/// In-memory buffer with a revision counter and an edit log.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    id: BufferId,
    name: String,
    lines: Vec<String>,
    revision: u64,
    /// `(revision, earliest position touched by that revision)`.
    edits: Vec<(u64, Position)>,
}

impl MemoryBuffer {
    pub fn new(id: BufferId, name: impl Into<String>, text: &str) -> Self {
        Self {
            id,
            name: name.into(),
            lines: text.lines().map(String::from).collect(),
            revision: 0,
            edits: Vec::new(),
        }
    }

    pub fn from_lines(id: BufferId, name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            lines,
            revision: 0,
            edits: Vec::new(),
        }
    }

    fn record(&mut self, at: Position) {
        self.revision += 1;
        self.edits.push((self.revision, at));
    }

    /// Replace the text of 1-based `line`. Out-of-range lines are ignored.
    pub fn set_line(&mut self, line: u32, text: impl Into<String>) {
        let Some(slot) = (line as usize)
            .checked_sub(1)
            .and_then(|idx| self.lines.get_mut(idx))
        else {
            return;
        };
        let text = text.into();
        let first_diff = slot
            .chars()
            .zip(text.chars())
            .take_while(|(a, b)| a == b)
            .count();
        *slot = text;
        self.record(Position::new(line, first_diff as u32));
    }

    /// Insert `text` as a new line so that it becomes 1-based `line`.
    pub fn insert_line(&mut self, line: u32, text: impl Into<String>) {
        let idx = (line.max(1) as usize - 1).min(self.lines.len());
        self.lines.insert(idx, text.into());
        self.record(Position::line_start(idx as u32 + 1));
    }

    /// Remove 1-based `line`. Out-of-range lines are ignored.
    pub fn remove_line(&mut self, line: u32) {
        let Some(idx) = (line as usize).checked_sub(1) else {
            return;
        };
        if idx >= self.lines.len() {
            return;
        }
        self.lines.remove(idx);
        self.record(Position::line_start(line));
    }

    pub fn push_line(&mut self, text: impl Into<String>) {
        let line = self.lines.len() as u32 + 1;
        self.insert_line(line, text);
    }
}

impl EditorBuffer for MemoryBuffer {
    fn id(&self) -> BufferId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn lines(&self) -> &[String] {
        &self.lines
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.id, self.revision)
    }

    fn changed_since(&self, checkpoint: &Checkpoint) -> Option<Position> {
        if checkpoint.buffer() != self.id {
            return Some(Position::line_start(1));
        }
        self.edits
            .iter()
            .filter(|(rev, _)| *rev > checkpoint.revision())
            .map(|(_, pos)| *pos)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> MemoryBuffer {
        MemoryBuffer::new(BufferId::new(1), "/src/project/main.ml", text)
    }

    #[test]
    fn test_basename_strips_directories() {
        assert_eq!(buffer("").basename(), "main.ml");
        let b = MemoryBuffer::new(BufferId::new(2), r"C:\work\lib.ml", "");
        assert_eq!(b.basename(), "lib.ml");
    }

    #[test]
    fn test_untouched_buffer_has_no_change() {
        let b = buffer("let x = 1\nlet y = 2");
        let cp = b.checkpoint();
        assert_eq!(b.changed_since(&cp), None);
    }

    #[test]
    fn test_set_line_reports_first_differing_column() {
        let mut b = buffer("let x = 1\nlet y = 2");
        let cp = b.checkpoint();
        b.set_line(2, "let y = 3");
        assert_eq!(b.changed_since(&cp), Some(Position::new(2, 8)));
        assert_eq!(b.lines()[1], "let y = 3");
    }

    #[test]
    fn test_earliest_edit_wins() {
        let mut b = buffer("a\nb\nc\nd");
        let cp = b.checkpoint();
        b.set_line(4, "dd");
        b.insert_line(2, "new");
        b.set_line(5, "ddd");
        assert_eq!(b.changed_since(&cp), Some(Position::line_start(2)));
    }

    #[test]
    fn test_edits_before_checkpoint_are_ignored() {
        let mut b = buffer("a\nb\nc");
        b.set_line(1, "z");
        let cp = b.checkpoint();
        b.set_line(3, "y");
        assert_eq!(b.changed_since(&cp), Some(Position::new(3, 0)));
    }

    #[test]
    fn test_remove_and_push() {
        let mut b = buffer("a\nb");
        b.remove_line(1);
        b.push_line("c");
        b.remove_line(9);
        assert_eq!(b.lines(), ["b".to_string(), "c".to_string()]);
        assert_eq!(b.line_count(), 2);
    }

    #[test]
    fn test_checkpoint_from_other_buffer_is_dirty_from_start() {
        let a = buffer("x");
        let b = MemoryBuffer::new(BufferId::new(9), "other.ml", "x");
        assert_eq!(b.changed_since(&a.checkpoint()), Some(Position::line_start(1)));
    }
}
