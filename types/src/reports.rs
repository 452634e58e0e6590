//! Result payloads returned by the analysis server.
//!
//! These mirror the server's JSON shapes closely; presentation glue converts
//! them into editor-specific values.

use serde::{Deserialize, Serialize};

use crate::position::{Position, Span};

/// How a `tell` chunk should be interpreted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TellKind {
    /// A chunk re-parsed as a complete syntactic unit.
    Struct,
    /// A chunk appended to close out a previously incomplete unit.
    End,
}

impl TellKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::End => "end",
        }
    }
}

/// One scope in a `type enclosing` answer, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclosingFrame {
    #[serde(flatten)]
    pub span: Span,
    #[serde(rename = "type")]
    pub type_description: String,
}

impl EnclosingFrame {
    #[must_use]
    pub fn new(span: Span, type_description: impl Into<String>) -> Self {
        Self {
            span,
            type_description: type_description.into(),
        }
    }
}

/// A completion candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub kind: String,
}

/// Category of a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Type,
    Parser,
    Warning,
    Env,
    #[serde(other)]
    Unknown,
}

impl ErrorKind {
    /// Type and parser errors are hard errors; everything else is advisory.
    #[must_use]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Type | Self::Parser)
    }
}

/// One entry from the `errors` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_frame_deserializes_flat_wire_shape() {
        let frame: EnclosingFrame = serde_json::from_value(serde_json::json!({
            "start": {"line": 1, "col": 0},
            "end": {"line": 3, "col": 2},
            "type": "int -> int"
        }))
        .unwrap();
        assert_eq!(frame.span.start, Position::new(1, 0));
        assert_eq!(frame.span.end, Position::new(3, 2));
        assert_eq!(frame.type_description, "int -> int");
    }

    #[test]
    fn completion_entry_tolerates_missing_fields() {
        let entry: CompletionEntry =
            serde_json::from_value(serde_json::json!({"name": "List.map"})).unwrap();
        assert_eq!(entry.name, "List.map");
        assert!(entry.desc.is_empty());
        assert!(entry.kind.is_empty());
    }

    #[test]
    fn error_report_without_location() {
        let report: ErrorReport = serde_json::from_value(serde_json::json!({
            "type": "env",
            "message": "Unbound module Foo"
        }))
        .unwrap();
        assert_eq!(report.kind, ErrorKind::Env);
        assert!(report.start.is_none());
        assert!(!report.kind.is_error());
    }

    #[test]
    fn unknown_error_kind_is_not_fatal() {
        let report: ErrorReport = serde_json::from_value(serde_json::json!({
            "type": "typer-extension",
            "message": "odd"
        }))
        .unwrap();
        assert_eq!(report.kind, ErrorKind::Unknown);
    }

    #[test]
    fn parser_and_type_errors_are_errors() {
        assert!(ErrorKind::Type.is_error());
        assert!(ErrorKind::Parser.is_error());
        assert!(!ErrorKind::Warning.is_error());
    }

    #[test]
    fn tell_kind_wire_names() {
        assert_eq!(serde_json::to_value(TellKind::Struct).unwrap(), "struct");
        assert_eq!(TellKind::End.as_str(), "end");
    }
}
