//! Core domain types for merlin-bridge.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the protocol client serializes them onto
//! the wire, and presentation glue reads them back out.

mod ids;
mod position;
mod reports;

pub use ids::BufferId;
pub use position::{ParsePositionError, Position, Span};
pub use reports::{CompletionEntry, EnclosingFrame, ErrorKind, ErrorReport, TellKind};
