//! Streams buffer content to the server in bounded chunks.
//!
//! The first chunk goes out as `tell struct`. While the server answers that it
//! is not yet satisfied (an unfinished syntactic unit), the next window of
//! lines is appended as `tell end` until the buffer is exhausted. Running out
//! of buffer while the server still wants more is accepted as-is: the partial
//! parse surfaces later as ordinary errors.

use merlin_types::TellKind;
use serde_json::Value;

use crate::client::{Transport, request};
use crate::error::BridgeError;
use crate::protocol;

/// Number of lines appended per `tell end` round.
pub const FEED_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReport {
    /// Last buffer line (1-based, inclusive) handed to the server.
    pub end_line: usize,
    /// Number of `tell` commands sent.
    pub rounds: usize,
    /// Number of line fragments sent across all rounds.
    pub lines_sent: usize,
    /// Whether the server declared itself satisfied.
    pub satisfied: bool,
}

/// Feed `first_chunk` (which ends at buffer line `end_line`), then keep
/// appending windows from `buffer_lines` while the server asks for more.
pub(crate) async fn feed<T: Transport>(
    transport: &mut T,
    buffer_lines: &[String],
    first_chunk: Vec<String>,
    end_line: usize,
) -> Result<FeedReport, BridgeError> {
    let max_line = buffer_lines.len();
    let mut end_line = end_line.min(max_line);

    let mut chunk = first_chunk;
    let mut kind = TellKind::Struct;
    let mut rounds = 0;
    let mut lines_sent = 0;

    loop {
        rounds += 1;
        lines_sent += chunk.len();
        let answer: Value = request(transport, &protocol::tell(kind, &chunk)).await?;
        if is_truthy(&answer) {
            return Ok(FeedReport {
                end_line,
                rounds,
                lines_sent,
                satisfied: true,
            });
        }

        if end_line >= max_line {
            tracing::debug!(end_line, rounds, "buffer exhausted before server was satisfied");
            return Ok(FeedReport {
                end_line,
                rounds,
                lines_sent,
                satisfied: false,
            });
        }

        let next_end = (end_line + FEED_WINDOW).min(max_line);
        chunk = buffer_lines[end_line..next_end].to_vec();
        end_line = next_end;
        kind = TellKind::End;
    }
}

/// Truthiness of a `tell` answer; `false`, `null`, `0` and empty values mean "need more".
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Outcome;
    use crate::testing::ScriptedServer;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("let v{i} = {i}")).collect()
    }

    /// Server that stays unsatisfied for the first `hungry` tells.
    fn hungry_server(hungry: usize) -> ScriptedServer {
        let mut seen = 0;
        ScriptedServer::new(move |cmd| {
            assert_eq!(cmd.name(), "tell");
            seen += 1;
            Outcome::Return(Value::Bool(seen > hungry))
        })
    }

    fn told_text(server: &ScriptedServer, round: usize) -> (String, String) {
        let cmd = &server.commands()[round];
        (
            cmd.args()[0].as_str().unwrap().to_string(),
            cmd.args()[1].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_satisfied_on_first_chunk() {
        let buf = lines(25);
        let mut server = hungry_server(0);
        let report = feed(&mut server, &buf, buf.clone(), 25).await.unwrap();

        assert_eq!(report.rounds, 1);
        assert!(report.satisfied);
        assert_eq!(report.end_line, 25);
        let (kind, text) = told_text(&server, 0);
        assert_eq!(kind, "struct");
        assert_eq!(text.lines().count(), 25);
    }

    #[tokio::test]
    async fn test_appends_windows_tagged_end() {
        let buf = lines(50);
        let mut server = hungry_server(2);
        let report = feed(&mut server, &buf, buf[..5].to_vec(), 5).await.unwrap();

        assert!(report.satisfied);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.end_line, 45);
        assert_eq!(report.lines_sent, 45);

        let (kind, text) = told_text(&server, 1);
        assert_eq!(kind, "end");
        assert!(text.starts_with("let v6 = 6\n"));
        assert!(text.ends_with("let v25 = 25\n"));
        let (_, text) = told_text(&server, 2);
        assert!(text.starts_with("let v26 = 26\n"));
        assert!(text.ends_with("let v45 = 45\n"));
    }

    #[tokio::test]
    async fn test_stops_at_buffer_end_when_never_satisfied() {
        let buf = lines(47);
        let mut server = hungry_server(usize::MAX);
        let report = feed(&mut server, &buf, buf[..3].to_vec(), 3).await.unwrap();

        assert!(!report.satisfied);
        assert_eq!(report.end_line, 47);
        // ceil((47 - 3) / 20) + 1
        assert_eq!(report.rounds, 4);
        assert_eq!(report.lines_sent, 47);
        let (_, last) = told_text(&server, 3);
        assert_eq!(last.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_round_bound_holds_for_many_sizes() {
        for max in [1usize, 19, 20, 21, 40, 41, 99] {
            for start in [0usize, 1, max / 2, max] {
                let buf = lines(max);
                let mut server = hungry_server(usize::MAX);
                let report = feed(&mut server, &buf, buf[..start].to_vec(), start)
                    .await
                    .unwrap();
                let bound = (max - start).div_ceil(FEED_WINDOW) + 1;
                assert!(report.rounds <= bound, "max={max} start={start}");
                assert_eq!(report.lines_sent, max, "every line sent exactly once");
            }
        }
    }

    #[tokio::test]
    async fn test_rejection_propagates() {
        let buf = lines(3);
        let mut server =
            ScriptedServer::new(|_| Outcome::Failure(Value::String("bad tell".into())));
        let err = feed(&mut server, &buf, buf.clone(), 3).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&serde_json::json!(false)));
        assert!(!is_truthy(&serde_json::json!(0)));
        assert!(is_truthy(&serde_json::json!(true)));
        assert!(is_truthy(&serde_json::json!(1)));
    }
}
