//! Request and response frames for the analysis server protocol.
//!
//! A request is a JSON array `[name, arg1, arg2, ...]`; a response is
//! `[tag]` or `[tag, payload]`. There are no correlation identifiers: the
//! only thing tying a response to its request is ordering.

use merlin_types::{Position, TellKind};
use serde_json::Value;

/// A single protocol command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn position(self, pos: Position) -> Self {
        self.arg(position_value(pos))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Human-readable label for logs and error messages, e.g. `seek before`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.args.first().and_then(Value::as_str) {
            Some(sub) => format!("{} {sub}", self.name),
            None => self.name.clone(),
        }
    }

    /// Serialize to the wire array.
    #[must_use]
    pub fn to_frame(&self) -> Value {
        let mut frame = Vec::with_capacity(self.args.len() + 1);
        frame.push(Value::String(self.name.clone()));
        frame.extend(self.args.iter().cloned());
        Value::Array(frame)
    }

    /// Parse a wire array back into a command. Used by stub servers.
    #[must_use]
    pub fn from_frame(frame: &Value) -> Option<Self> {
        let (name, args) = frame.as_array()?.split_first()?;
        Some(Self {
            name: name.as_str()?.to_string(),
            args: args.to_vec(),
        })
    }
}

/// Tagged result of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Return(Value),
    Failure(Value),
    Error(Value),
    Exception(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("response is not a JSON array: {0}")]
    NotAnArray(String),
    #[error("response array has {0} elements, expected 1 or 2")]
    BadArity(usize),
    #[error("response tag is not a string: {0}")]
    TagNotString(String),
    #[error("unknown response tag '{0}'")]
    UnknownTag(String),
}

impl Outcome {
    /// Parse a `[tag]` / `[tag, payload]` response frame.
    pub fn from_frame(frame: Value) -> Result<Self, ProtocolViolation> {
        let items = match frame {
            Value::Array(items) => items,
            other => return Err(ProtocolViolation::NotAnArray(other.to_string())),
        };
        if items.is_empty() || items.len() > 2 {
            return Err(ProtocolViolation::BadArity(items.len()));
        }

        let mut items = items.into_iter();
        let tag = match items.next() {
            Some(Value::String(tag)) => tag,
            Some(other) => return Err(ProtocolViolation::TagNotString(other.to_string())),
            None => return Err(ProtocolViolation::BadArity(0)),
        };
        let payload = items.next().unwrap_or(Value::Null);

        match tag.as_str() {
            "return" => Ok(Self::Return(payload)),
            "failure" => Ok(Self::Failure(payload)),
            "error" => Ok(Self::Error(payload)),
            "exception" => Ok(Self::Exception(payload)),
            _ => Err(ProtocolViolation::UnknownTag(tag)),
        }
    }

    /// Serialize back to the wire form. Used by stub servers.
    #[must_use]
    pub fn to_frame(&self) -> Value {
        let (tag, payload) = match self {
            Self::Return(p) => ("return", p),
            Self::Failure(p) => ("failure", p),
            Self::Error(p) => ("error", p),
            Self::Exception(p) => ("exception", p),
        };
        serde_json::json!([tag, payload])
    }

    #[must_use]
    pub fn is_return(&self) -> bool {
        matches!(self, Self::Return(_))
    }
}

pub(crate) fn position_value(pos: Position) -> Value {
    serde_json::json!({ "line": pos.line, "col": pos.col })
}

// ── Command builders ───────────────────────────────────────────────────

pub(crate) fn refresh() -> Command {
    Command::new("refresh")
}

pub(crate) fn reset(name: Option<&str>) -> Command {
    match name {
        Some(name) => Command::new("reset").arg("name").arg(name),
        None => Command::new("reset"),
    }
}

/// `tell <kind> <text>`; lines are joined with `\n` and terminated by one.
pub(crate) fn tell(kind: TellKind, lines: &[String]) -> Command {
    let mut text = lines.join("\n");
    text.push('\n');
    Command::new("tell").arg(kind.as_str()).arg(text)
}

pub(crate) fn seek_before(pos: Position) -> Command {
    Command::new("seek").arg("before").position(pos)
}

pub(crate) fn seek_exact(pos: Position) -> Command {
    Command::new("seek").arg("exact").position(pos)
}

pub(crate) fn seek_scope() -> Command {
    Command::new("seek").arg("maximize_scope")
}

pub(crate) fn seek_end() -> Command {
    Command::new("seek").arg("end")
}

pub(crate) fn complete(prefix: &str, at: Option<Position>) -> Command {
    let cmd = Command::new("complete").arg("prefix").arg(prefix);
    match at {
        Some(pos) => cmd.arg("at").position(pos),
        None => cmd,
    }
}

pub(crate) fn errors() -> Command {
    Command::new("errors")
}

pub(crate) fn type_at(expr: Option<&str>, pos: Position) -> Command {
    let cmd = Command::new("type");
    let cmd = match expr {
        Some(expr) => cmd.arg("expression").arg(expr),
        None => cmd,
    };
    cmd.arg("at").position(pos)
}

pub(crate) fn type_enclosing(pos: Position) -> Command {
    Command::new("type").arg("enclosing").position(pos)
}

pub(crate) fn boundary() -> Command {
    Command::new("boundary")
}

pub(crate) fn project_load(path: &str) -> Command {
    Command::new("project").arg("load").arg(path)
}

pub(crate) fn find_use(packages: &[String]) -> Command {
    packages
        .iter()
        .fold(Command::new("find").arg("use"), |cmd, pkg| {
            cmd.arg(pkg.as_str())
        })
}

pub(crate) fn find_list() -> Command {
    Command::new("find").arg("list")
}

pub(crate) fn which_path(name: &str) -> Command {
    Command::new("which").arg("path").arg(name)
}

pub(crate) fn which_with_ext(ext: &str) -> Command {
    Command::new("which").arg("with_ext").arg(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_roundtrip() {
        let commands = [
            refresh(),
            reset(Some("main.ml")),
            tell(TellKind::Struct, &["let x = 1".to_string()]),
            seek_before(Position::new(4, 2)),
            complete("List.", Some(Position::new(2, 5))),
            type_at(Some("x"), Position::new(1, 4)),
            find_use(&["unix".to_string(), "str".to_string()]),
        ];
        for cmd in commands {
            let frame = cmd.to_frame();
            let text = serde_json::to_string(&frame).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(Command::from_frame(&parsed), Some(cmd));
        }
    }

    #[test]
    fn test_command_frame_shape() {
        let frame = seek_exact(Position::new(3, 1)).to_frame();
        assert_eq!(
            frame,
            serde_json::json!(["seek", "exact", {"line": 3, "col": 1}])
        );
    }

    #[test]
    fn test_reset_without_name_has_no_args() {
        assert_eq!(reset(None).to_frame(), serde_json::json!(["reset"]));
        assert_eq!(
            reset(Some("a.ml")).to_frame(),
            serde_json::json!(["reset", "name", "a.ml"])
        );
    }

    #[test]
    fn test_tell_joins_lines_with_trailing_newline() {
        let cmd = tell(TellKind::End, &["a".to_string(), "b".to_string()]);
        assert_eq!(cmd.to_frame(), serde_json::json!(["tell", "end", "a\nb\n"]));
    }

    #[test]
    fn test_complete_at_appends_position() {
        let cmd = complete("Li", Some(Position::new(7, 3)));
        assert_eq!(
            cmd.to_frame(),
            serde_json::json!(["complete", "prefix", "Li", "at", {"line": 7, "col": 3}])
        );
        assert_eq!(
            complete("Li", None).to_frame(),
            serde_json::json!(["complete", "prefix", "Li"])
        );
    }

    #[test]
    fn test_type_expression_form() {
        assert_eq!(
            type_at(Some("f x"), Position::new(2, 0)).to_frame(),
            serde_json::json!(["type", "expression", "f x", "at", {"line": 2, "col": 0}])
        );
        assert_eq!(
            type_at(None, Position::new(2, 0)).to_frame(),
            serde_json::json!(["type", "at", {"line": 2, "col": 0}])
        );
    }

    #[test]
    fn test_label_includes_subcommand() {
        assert_eq!(seek_before(Position::new(1, 0)).label(), "seek before");
        assert_eq!(errors().label(), "errors");
        assert_eq!(
            type_enclosing(Position::new(1, 0)).label(),
            "type enclosing"
        );
    }

    #[test]
    fn test_from_frame_rejects_non_string_name() {
        assert!(Command::from_frame(&serde_json::json!([1, 2])).is_none());
        assert!(Command::from_frame(&serde_json::json!([])).is_none());
        assert!(Command::from_frame(&serde_json::json!({"a": 1})).is_none());
    }

    #[test]
    fn test_outcome_tags() {
        let cases = [
            ("return", Outcome::Return(serde_json::json!(1))),
            ("failure", Outcome::Failure(serde_json::json!(1))),
            ("error", Outcome::Error(serde_json::json!(1))),
            ("exception", Outcome::Exception(serde_json::json!(1))),
        ];
        for (tag, expected) in cases {
            let parsed = Outcome::from_frame(serde_json::json!([tag, 1])).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.to_frame(), serde_json::json!([tag, 1]));
        }
    }

    #[test]
    fn test_outcome_without_payload_is_null() {
        let parsed = Outcome::from_frame(serde_json::json!(["return"])).unwrap();
        assert_eq!(parsed, Outcome::Return(Value::Null));
    }

    #[test]
    fn test_outcome_unknown_tag_is_violation() {
        assert_eq!(
            Outcome::from_frame(serde_json::json!(["maybe", 1])),
            Err(ProtocolViolation::UnknownTag("maybe".to_string()))
        );
    }

    #[test]
    fn test_outcome_bad_shapes() {
        assert_eq!(
            Outcome::from_frame(serde_json::json!([])),
            Err(ProtocolViolation::BadArity(0))
        );
        assert_eq!(
            Outcome::from_frame(serde_json::json!(["return", 1, 2])),
            Err(ProtocolViolation::BadArity(3))
        );
        assert!(matches!(
            Outcome::from_frame(serde_json::json!({"return": 1})),
            Err(ProtocolViolation::NotAnArray(_))
        ));
        assert!(matches!(
            Outcome::from_frame(serde_json::json!([7, 1])),
            Err(ProtocolViolation::TagNotString(_))
        ));
    }
}
