//! Tracks how much of the editor buffer the server has seen.
//!
//! After a successful send the tracker keeps a [`SyncMark`]: the buffer
//! checkpoint the content came from, the position just past the last line
//! the server holds, and the server generation it was sent to. On the next
//! sync the tracker asks the server to seek back to the earliest point that
//! may differ and resends only the lines from there to the cursor.

use merlin_types::{BufferId, Position};

use crate::buffer::{Checkpoint, EditorBuffer};
use crate::client::{Transport, request};
use crate::error::BridgeError;
use crate::feeder::{self, FeedReport};
use crate::protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMark {
    checkpoint: Checkpoint,
    confirmed: Position,
    generation: u64,
}

impl SyncMark {
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// First position the server has not been told about.
    #[must_use]
    pub fn confirmed(&self) -> Position {
        self.confirmed
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Server state was reset and the buffer sent from line 1.
    Full,
    /// Only the region after the server's seek point was resent.
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    /// `None` when there was nothing to send.
    pub feed: Option<FeedReport>,
    /// The tracked buffer differs from the one synchronized previously.
    pub buffer_switched: bool,
    /// Server cursor after the final exact seek.
    pub position: Position,
}

impl SyncReport {
    #[must_use]
    pub fn lines_sent(&self) -> usize {
        self.feed.map_or(0, |f| f.lines_sent)
    }
}

#[derive(Debug, Default)]
pub struct SyncTracker {
    mark: Option<SyncMark>,
    tracked: Option<BufferId>,
}

impl SyncTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mark(&self) -> Option<&SyncMark> {
        self.mark.as_ref()
    }

    /// Buffer of the last successful sync.
    #[must_use]
    pub fn tracked(&self) -> Option<BufferId> {
        self.tracked
    }

    /// Whether syncing `buffer` would move away from the tracked buffer.
    #[must_use]
    pub fn is_switch(&self, buffer: BufferId) -> bool {
        self.tracked != Some(buffer)
    }

    /// Forget the mark; the next sync resends everything.
    pub fn invalidate(&mut self) {
        self.mark = None;
    }

    /// Clear server-side buffer state (optionally naming the file) and the mark.
    pub async fn reset<T: Transport>(
        &mut self,
        transport: &mut T,
        name: Option<&str>,
    ) -> Result<Position, BridgeError> {
        self.mark = None;
        request(transport, &protocol::reset(name)).await
    }

    /// Bring the server's view of `buffer` up to `target`'s line, then put the
    /// server cursor exactly on `target`.
    pub async fn sync_to<T, B>(
        &mut self,
        transport: &mut T,
        buffer: &B,
        target: Position,
    ) -> Result<SyncReport, BridgeError>
    where
        T: Transport,
        B: EditorBuffer + ?Sized,
    {
        let fresh = buffer.checkpoint();
        let lines = buffer.lines();
        let end_line = (target.line as usize).min(lines.len());
        let buffer_switched = self.is_switch(fresh.buffer());

        let resume = self
            .mark
            .filter(|mark| {
                mark.checkpoint.buffer() == fresh.buffer()
                    && mark.generation == transport.generation()
            })
            .map(|mark| (mark.generation, resume_point(&mark, buffer)));

        let incremental = match resume {
            Some((generation, at)) => {
                let landed: Position = request(transport, &protocol::seek_before(at)).await?;
                tracing::trace!(%at, %landed, "seek before");
                if transport.generation() == generation {
                    (landed.line > 1).then(|| (landed, delta_from(lines, landed, end_line)))
                } else {
                    tracing::debug!(
                        generation,
                        current = transport.generation(),
                        "server replaced during seek, resending buffer"
                    );
                    None
                }
            }
            None => None,
        };

        let (mode, chunk, landed) = match incremental {
            Some((landed, chunk)) => (SyncMode::Incremental, chunk, landed),
            None => {
                self.reset(transport, Some(buffer.basename())).await?;
                (
                    SyncMode::Full,
                    lines[..end_line].to_vec(),
                    Position::line_start(1),
                )
            }
        };

        let feed = if chunk.is_empty() {
            None
        } else {
            Some(feeder::feed(transport, lines, chunk, end_line).await?)
        };

        let confirmed = match feed {
            Some(report) => Position::line_start(report.end_line as u32 + 1),
            None => landed,
        };
        self.mark = Some(SyncMark {
            checkpoint: fresh,
            confirmed,
            generation: transport.generation(),
        });

        tracing::debug!(
            buffer = %fresh.buffer(),
            ?mode,
            lines_sent = feed.map_or(0, |f| f.lines_sent),
            %confirmed,
            "buffer synchronized"
        );

        let position = request(transport, &protocol::seek_exact(target)).await?;
        self.tracked = Some(fresh.buffer());
        Ok(SyncReport {
            mode,
            feed,
            buffer_switched,
            position,
        })
    }
}

/// Earliest point the server's copy may differ from `buffer`.
fn resume_point<B: EditorBuffer + ?Sized>(mark: &SyncMark, buffer: &B) -> Position {
    match buffer.changed_since(&mark.checkpoint) {
        Some(changed) => changed.min(mark.confirmed),
        None => mark.confirmed,
    }
}

/// Lines to resend after the server landed on `landed`: the rest of that
/// line from its column, then every following line through `end_line`.
fn delta_from(lines: &[String], landed: Position, end_line: usize) -> Vec<String> {
    let idx = landed.line as usize - 1;
    if idx >= end_line {
        return Vec::new();
    }
    let rest: String = lines[idx].chars().skip(landed.col as usize).collect();
    let mut delta = Vec::with_capacity(end_line - idx);
    delta.push(rest);
    delta.extend_from_slice(&lines[idx + 1..end_line]);
    delta
}
