//! Buffer synchronization and protocol client for the merlin analysis server.
//!
//! The pieces, bottom up:
//! - [`codec`], [`protocol`] and [`client`]: one JSON line out, one JSON line
//!   back, with the response tag discriminated into an [`Outcome`].
//! - [`supervisor`]: the child process behind the pipes.
//! - [`feeder`] and [`sync`]: keep the server's copy of a buffer current
//!   while resending as little as possible.
//! - [`enclosing`]: stepping through nested scopes around the cursor.
//! - [`session`]: the editor-facing operations tying the above together.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod enclosing;
pub mod error;
pub mod feeder;
pub mod present;
pub mod project;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod sync;

#[cfg(test)]
mod testing;

pub use buffer::{Checkpoint, EditorBuffer, MemoryBuffer};
pub use client::{Client, Transport};
pub use config::{BridgeConfig, ConfigError};
pub use enclosing::{EnclosingNavigator, EnclosingView, Highlight, Region};
pub use error::{BridgeError, KnownFailure, Rejection, classify, describe, describe_error};
pub use feeder::{FEED_WINDOW, FeedReport};
pub use present::{Presenter, TextPresenter};
pub use protocol::{Command, Outcome, ProtocolViolation};
pub use session::{EnclosingResult, Session, TypeInfo};
pub use supervisor::Supervisor;
pub use sync::{SyncMark, SyncMode, SyncReport, SyncTracker};
