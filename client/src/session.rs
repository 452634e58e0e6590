//! Editor-facing operations over one server conversation.
//!
//! A [`Session`] owns the transport, the sync tracker and the enclosing
//! navigator. Operations that depend on buffer content synchronize first,
//! then issue their query with the server cursor on the requested position.

use std::fmt;
use std::path::{Path, PathBuf};

use merlin_types::{CompletionEntry, EnclosingFrame, ErrorReport, Position, Span, TellKind};
use serde_json::Value;

use crate::buffer::EditorBuffer;
use crate::client::{Transport, execute, request};
use crate::enclosing::{EnclosingNavigator, EnclosingView};
use crate::error::BridgeError;
use crate::feeder;
use crate::project;
use crate::protocol;
use crate::supervisor::Supervisor;
use crate::sync::{SyncReport, SyncTracker};

/// Answer to a type query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// The expression that was typed, when the expression query succeeded.
    pub expression: Option<String>,
    pub type_description: String,
    /// The answer came from a fallback query and may not match what was asked.
    pub approximate: bool,
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.approximate {
            f.write_str("(approx) ")?;
        }
        match &self.expression {
            Some(expr) => write!(f, "{expr} : {}", self.type_description),
            None => f.write_str(&self.type_description),
        }
    }
}

/// What `type enclosing` ended up showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnclosingResult {
    /// The innermost enclosing scope; the navigator now holds the rest.
    Scope(EnclosingView),
    /// No scopes were available; a plain type query answered instead.
    Fallback(TypeInfo),
}

pub struct Session<T> {
    transport: T,
    tracker: SyncTracker,
    navigator: EnclosingNavigator,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            tracker: SyncTracker::new(),
            navigator: EnclosingNavigator::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.tracker
    }

    pub fn navigator(&self) -> &EnclosingNavigator {
        &self.navigator
    }

    // ── Raw commands ───────────────────────────────────────────────────

    /// Ask the server to reload changed compiled interfaces.
    pub async fn refresh(&mut self) -> Result<(), BridgeError> {
        execute(&mut self.transport, &protocol::refresh()).await
    }

    pub async fn reset(&mut self, name: Option<&str>) -> Result<Position, BridgeError> {
        self.tracker.reset(&mut self.transport, name).await
    }

    /// Send one chunk; `true` means the server is satisfied.
    pub async fn tell(&mut self, kind: TellKind, lines: &[String]) -> Result<bool, BridgeError> {
        let answer: Value = request(&mut self.transport, &protocol::tell(kind, lines)).await?;
        Ok(feeder::is_truthy(&answer))
    }

    pub async fn seek_before(&mut self, pos: Position) -> Result<Position, BridgeError> {
        request(&mut self.transport, &protocol::seek_before(pos)).await
    }

    pub async fn seek_exact(&mut self, pos: Position) -> Result<Position, BridgeError> {
        request(&mut self.transport, &protocol::seek_exact(pos)).await
    }

    pub async fn seek_scope(&mut self) -> Result<Position, BridgeError> {
        request(&mut self.transport, &protocol::seek_scope()).await
    }

    pub async fn seek_end(&mut self) -> Result<Position, BridgeError> {
        request(&mut self.transport, &protocol::seek_end()).await
    }

    // ── Synchronization ────────────────────────────────────────────────

    pub async fn sync_to<B>(
        &mut self,
        buffer: &B,
        target: Position,
    ) -> Result<SyncReport, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        if self.tracker.is_switch(buffer.checkpoint().buffer()) {
            self.navigator.clear();
        }
        self.tracker
            .sync_to(&mut self.transport, buffer, target)
            .await
    }

    /// Synchronize up to the cursor and leave the server there.
    pub async fn sync_cursor<B>(
        &mut self,
        buffer: &B,
        cursor: Position,
    ) -> Result<SyncReport, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.sync_to(buffer, cursor).await
    }

    /// Synchronize the whole buffer.
    pub async fn sync_full_buffer<B>(&mut self, buffer: &B) -> Result<SyncReport, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        let last = u32::try_from(buffer.line_count()).unwrap_or(u32::MAX).max(1);
        self.sync_to(buffer, Position::line_start(last)).await
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub async fn complete<B>(
        &mut self,
        buffer: &B,
        cursor: Position,
        prefix: &str,
    ) -> Result<Vec<CompletionEntry>, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.sync_cursor(buffer, cursor).await?;
        request(&mut self.transport, &protocol::complete(prefix, None)).await
    }

    /// Complete `prefix` in the environment at `cursor` rather than at the
    /// server's current position.
    pub async fn complete_at<B>(
        &mut self,
        buffer: &B,
        cursor: Position,
        prefix: &str,
    ) -> Result<Vec<CompletionEntry>, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.sync_cursor(buffer, cursor).await?;
        request(
            &mut self.transport,
            &protocol::complete(prefix, Some(cursor)),
        )
        .await
    }

    /// Errors for whatever the server currently holds.
    pub async fn errors(&mut self) -> Result<Vec<ErrorReport>, BridgeError> {
        request(&mut self.transport, &protocol::errors()).await
    }

    /// Type of `expr` (or of the expression under the cursor). A failed
    /// expression query is retried without the expression and the answer is
    /// flagged approximate.
    pub async fn type_at<B>(
        &mut self,
        buffer: &B,
        cursor: Position,
        expr: Option<&str>,
    ) -> Result<TypeInfo, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.sync_cursor(buffer, cursor).await?;
        self.query_type(cursor, expr, false).await
    }

    async fn query_type(
        &mut self,
        cursor: Position,
        expr: Option<&str>,
        mut approximate: bool,
    ) -> Result<TypeInfo, BridgeError> {
        if let Some(expr) = expr {
            let command = protocol::type_at(Some(expr), cursor);
            match request::<_, Value>(&mut self.transport, &command).await {
                Ok(payload) => {
                    return Ok(TypeInfo {
                        expression: Some(expr.to_string()),
                        type_description: type_text(payload),
                        approximate,
                    });
                }
                Err(err) if err.is_rejection() => {
                    tracing::debug!(expr, "expression type failed, retrying at cursor: {err}");
                    approximate = true;
                }
                Err(err) => return Err(err),
            }
        }

        let payload = request(&mut self.transport, &protocol::type_at(None, cursor)).await?;
        Ok(TypeInfo {
            expression: None,
            type_description: type_text(payload),
            approximate,
        })
    }

    /// Show the innermost scope around the cursor and load the navigator
    /// with all of them. Falls back to an approximate type query when the
    /// server has no scopes to offer.
    pub async fn type_enclosing<B>(
        &mut self,
        buffer: &B,
        cursor: Position,
        expr: Option<&str>,
    ) -> Result<EnclosingResult, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.navigator.clear();
        self.sync_cursor(buffer, cursor).await?;

        let command = protocol::type_enclosing(cursor);
        let frames = match request::<_, Value>(&mut self.transport, &command).await {
            Ok(payload) => enclosing_frames(payload)?,
            Err(err) if err.is_rejection() => {
                tracing::debug!("type enclosing rejected: {err}");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        self.navigator.replace(frames);
        if let Some(view) = self.navigator.step_forward() {
            return Ok(EnclosingResult::Scope(view));
        }
        let info = self.query_type(cursor, expr, true).await?;
        Ok(EnclosingResult::Fallback(info))
    }

    pub fn next_enclosing(&mut self) -> Option<EnclosingView> {
        self.navigator.step_forward()
    }

    pub fn prev_enclosing(&mut self) -> Option<EnclosingView> {
        self.navigator.step_backward()
    }

    /// Bounds of the phrase at the server's current position.
    pub async fn boundary(&mut self) -> Result<Option<Span>, BridgeError> {
        let bounds: Option<[Position; 2]> =
            request(&mut self.transport, &protocol::boundary()).await?;
        Ok(bounds.map(|[start, end]| Span::new(start, end)))
    }

    /// Smallest span of whole phrases covering `first..=last`.
    pub async fn select_phrase<B>(
        &mut self,
        buffer: &B,
        first: Position,
        last: Position,
    ) -> Result<Option<Span>, BridgeError>
    where
        B: EditorBuffer + ?Sized,
    {
        self.sync_to(buffer, last).await?;
        self.seek_exact(last).await?;
        let Some(at_last) = self.boundary().await? else {
            return Ok(None);
        };
        if first == last {
            return Ok(Some(at_last));
        }

        self.seek_exact(first).await?;
        Ok(Some(match self.boundary().await? {
            Some(at_first) => at_last.union(at_first),
            None => at_last,
        }))
    }

    // ── Project and package lookups ────────────────────────────────────

    /// Path of the source file for `name` (with `ext` appended when given).
    pub async fn which_file(
        &mut self,
        name: &str,
        ext: Option<&str>,
    ) -> Result<String, BridgeError> {
        let name = match ext {
            Some(ext) => format!("{name}.{ext}"),
            None => name.to_string(),
        };
        request(&mut self.transport, &protocol::which_path(&name)).await
    }

    /// Files known to the server with extension `ext`, sorted and unique.
    pub async fn which_with_ext(&mut self, ext: &str) -> Result<Vec<String>, BridgeError> {
        let mut files: Vec<String> =
            request(&mut self.transport, &protocol::which_with_ext(ext)).await?;
        files.sort();
        files.dedup();
        Ok(files)
    }

    pub async fn find_use(&mut self, packages: &[String]) -> Result<(), BridgeError> {
        execute(&mut self.transport, &protocol::find_use(packages)).await
    }

    pub async fn find_list(&mut self) -> Result<Vec<String>, BridgeError> {
        request(&mut self.transport, &protocol::find_list()).await
    }

    /// Load the nearest `.merlin` at or above `dir`, then reset the server
    /// so the project settings take effect. Returns the file that was loaded.
    pub async fn load_project(
        &mut self,
        dir: &Path,
        max_depth: usize,
    ) -> Result<Option<PathBuf>, BridgeError> {
        let Some(path) = project::find_project_file(dir, max_depth) else {
            tracing::debug!(dir = %dir.display(), max_depth, "no project file found");
            return Ok(None);
        };

        execute(
            &mut self.transport,
            &protocol::project_load(&path.to_string_lossy()),
        )
        .await?;
        self.reset(None).await?;
        tracing::info!(path = %path.display(), "project loaded");
        Ok(Some(path))
    }
}

impl Session<Supervisor> {
    /// Replace the server process; the next sync resends everything.
    pub async fn restart(&mut self) -> Result<(), BridgeError> {
        self.tracker.invalidate();
        self.navigator.clear();
        self.transport.restart().await
    }

    pub async fn add_flags<I, S>(&mut self, flags: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracker.invalidate();
        self.transport.add_flags(flags).await
    }

    pub async fn clear_flags(&mut self) -> Result<(), BridgeError> {
        self.tracker.invalidate();
        self.transport.clear_flags().await
    }

    pub fn is_loaded(&self) -> bool {
        self.transport.is_running()
    }

    pub async fn shutdown(&mut self) {
        self.tracker.invalidate();
        self.transport.shutdown().await;
    }
}

/// Type payloads are either a bare string or `{"type": ...}`.
fn type_text(payload: Value) -> String {
    match payload {
        Value::String(s) => s,
        Value::Object(mut map) => match map.remove("type") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    }
}

/// `type enclosing` answers with either a frame list or `[count, frames]`.
fn enclosing_frames(payload: Value) -> Result<Vec<EnclosingFrame>, BridgeError> {
    let frames = match payload {
        Value::Array(mut items)
            if items.len() == 2 && items[0].is_number() && items[1].is_array() =>
        {
            items.swap_remove(1)
        }
        other => other,
    };
    serde_json::from_value(frames).map_err(|source| BridgeError::UnexpectedPayload {
        command: "type enclosing".to_string(),
        source,
    })
}
