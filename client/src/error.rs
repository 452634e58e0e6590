//! Error severities surfaced by the bridge.
//!
//! `Failure`, `Error` and `Exception` are the server's own rejections; the
//! remaining variants are local: spawning, the pipe itself, or a response
//! that breaks the framing contract.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::protocol::{Outcome, ProtocolViolation};

/// A non-`return` outcome from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Recoverable protocol-level rejection (e.g. a malformed request).
    Failure(Value),
    /// Structured error carrying a `message` field.
    Error(Value),
    /// Unexpected exception raised inside the server.
    Exception(Value),
}

impl Rejection {
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::Failure(v) | Self::Error(v) | Self::Exception(v) => v,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure(v) => write!(f, "failure: {}", payload_text(v)),
            Self::Error(v) => write!(f, "error: {}", error_message(v)),
            Self::Exception(v) => write!(f, "exception: {}", payload_text(v)),
        }
    }
}

impl Outcome {
    /// Split into the usable payload or the rejection it carries.
    pub fn into_result(self) -> Result<Value, Rejection> {
        match self {
            Outcome::Return(v) => Ok(v),
            Outcome::Failure(v) => Err(Rejection::Failure(v)),
            Outcome::Error(v) => Err(Rejection::Error(v)),
            Outcome::Exception(v) => Err(Rejection::Exception(v)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(
        "failed to execute {executable}: {source}. Please ensure that {executable} is in PATH and is executable"
    )]
    Spawn {
        executable: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("server is not running after a failed start; an explicit restart is required")]
    RestartRequired,
    #[error("server closed its output")]
    Closed,
    #[error("transport failure: {0:#}")]
    Transport(anyhow::Error),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    #[error("{0}")]
    Rejected(Rejection),
    #[error("unexpected payload for '{command}': {source}")]
    UnexpectedPayload {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<Rejection> for BridgeError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl BridgeError {
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }

    /// Whether the server answered (as opposed to a local or transport failure).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.rejection().is_some()
    }
}

/// Known server failure signatures.
///
/// The server exposes no structured error codes, so these are recovered by
/// matching exception text. Keep all pattern matching inside [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnownFailure {
    CannotParse,
    NotFound,
    UnknownPackage { name: String, reason: String },
}

impl fmt::Display for KnownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotParse => write!(f, "error: Cannot parse"),
            Self::NotFound => write!(f, "error: Not found"),
            Self::UnknownPackage { name, reason } if reason.is_empty() => {
                write!(f, "error: Unknown package '{name}'")
            }
            Self::UnknownPackage { name, reason } => {
                write!(f, "error: Unknown package '{name}' ({reason})")
            }
        }
    }
}

struct FailurePatterns {
    cannot_parse: Regex,
    not_found: Regex,
    no_such_package: Regex,
}

static FAILURE_PATTERNS: OnceLock<FailurePatterns> = OnceLock::new();

fn failure_patterns() -> &'static FailurePatterns {
    FAILURE_PATTERNS.get_or_init(|| FailurePatterns {
        cannot_parse: Regex::new(r"Chunk_parser\.Error").expect("valid parser error regex"),
        not_found: Regex::new(r"Not_found").expect("valid not found regex"),
        no_such_package: Regex::new(
            r#"Fl_package_base\.No_such_package\("((?:[^"\\]|\\.)*)", "((?:[^"\\]|\\.)*)"\)"#,
        )
        .expect("valid package regex"),
    })
}

/// Map raw failure text onto a known signature, if any.
#[must_use]
pub fn classify(text: &str) -> Option<KnownFailure> {
    let patterns = failure_patterns();
    if patterns.cannot_parse.is_match(text) {
        return Some(KnownFailure::CannotParse);
    }
    if patterns.not_found.is_match(text) {
        return Some(KnownFailure::NotFound);
    }
    patterns
        .no_such_package
        .captures(text)
        .map(|caps| KnownFailure::UnknownPackage {
            name: caps[1].to_string(),
            reason: caps[2].to_string(),
        })
}

/// User-facing text for a rejection.
#[must_use]
pub fn describe(rejection: &Rejection) -> String {
    match rejection {
        Rejection::Error(v) => error_message(v),
        Rejection::Failure(v) | Rejection::Exception(v) => {
            let text = payload_text(v);
            match classify(&text) {
                Some(known) => known.to_string(),
                None => text,
            }
        }
    }
}

/// User-facing text for any bridge error.
#[must_use]
pub fn describe_error(err: &BridgeError) -> String {
    match err {
        BridgeError::Rejected(r) => describe(r),
        other => other.to_string(),
    }
}

fn payload_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn error_message(v: &Value) -> String {
    v.get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| payload_text(v))
}
