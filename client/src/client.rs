//! One-request-at-a-time conversation over a pair of pipes.

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::{LineReader, LineWriter};
use crate::error::BridgeError;
use crate::protocol::{Command, Outcome};

/// Anything that can carry one command to the server and bring back its outcome.
///
/// Holding `&mut self` for the whole call is what enforces the single
/// outstanding request: the framing has no correlation ids.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn call(&mut self, command: &Command) -> Result<Outcome, BridgeError>;

    /// Identity of the current server process.
    ///
    /// Changes whenever the process is replaced; server-side state from a
    /// previous generation must not be assumed.
    fn generation(&self) -> u64;
}

/// Protocol client bound to a reader/writer pair.
pub struct Client<R, W> {
    reader: LineReader<R>,
    writer: LineWriter<W>,
}

impl<R, W> Client<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
        }
    }

    /// Write one command and read exactly one response line.
    pub async fn call(&mut self, command: &Command) -> Result<Outcome, BridgeError> {
        tracing::trace!(command = %command.label(), "sending");
        self.writer
            .write_frame(&command.to_frame())
            .await
            .map_err(BridgeError::Transport)?;

        let frame = self
            .reader
            .read_frame()
            .await
            .map_err(BridgeError::Transport)?
            .ok_or(BridgeError::Closed)?;

        let outcome = Outcome::from_frame(frame)?;
        if !outcome.is_return() {
            tracing::debug!(command = %command.label(), ?outcome, "server rejected command");
        }
        Ok(outcome)
    }
}

/// Send `command` and deserialize a `return` payload into `D`.
pub(crate) async fn request<T, D>(transport: &mut T, command: &Command) -> Result<D, BridgeError>
where
    T: Transport,
    D: DeserializeOwned,
{
    let payload = transport.call(command).await?.into_result()?;
    serde_json::from_value(payload).map_err(|source| BridgeError::UnexpectedPayload {
        command: command.label(),
        source,
    })
}

/// Send `command`, requiring a `return` but ignoring its payload.
pub(crate) async fn execute<T: Transport>(
    transport: &mut T,
    command: &Command,
) -> Result<(), BridgeError> {
    transport.call(command).await?.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;
    use merlin_types::Position;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};

    type TestClient = Client<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    /// Client wired to a fake server task that answers each request with the
    /// next canned response, echoing the request it saw into `seen`.
    fn connect(
        responses: Vec<serde_json::Value>,
    ) -> (
        TestClient,
        tokio::task::JoinHandle<Vec<serde_json::Value>>,
    ) {
        let (client_side, server_side) = duplex(64 * 1024);
        let (client_read, client_write) = split(client_side);
        let (server_read, server_write) = split(server_side);

        let server = tokio::spawn(async move {
            let mut reader = LineReader::new(server_read);
            let mut writer = LineWriter::new(server_write);
            let mut seen = Vec::new();
            for response in responses {
                let Ok(Some(frame)) = reader.read_frame().await else {
                    break;
                };
                seen.push(frame);
                writer.write_frame(&response).await.unwrap();
            }
            seen
        });

        (Client::new(client_read, client_write), server)
    }

    #[tokio::test]
    async fn test_call_returns_payload() {
        let (mut client, server) = connect(vec![serde_json::json!(["return", {"line": 2, "col": 0}])]);

        let outcome = client
            .call(&protocol::seek_exact(Position::new(2, 0)))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Return(serde_json::json!({"line": 2, "col": 0}))
        );

        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec![serde_json::json!(["seek", "exact", {"line": 2, "col": 0}])]
        );
    }

    #[tokio::test]
    async fn test_each_severity_maps_to_outcome() {
        let (mut client, _server) = connect(vec![
            serde_json::json!(["failure", "bad request"]),
            serde_json::json!(["error", {"message": "boom"}]),
            serde_json::json!(["exception", "Not_found"]),
        ]);

        let cmd = protocol::errors();
        assert!(matches!(client.call(&cmd).await.unwrap(), Outcome::Failure(_)));
        assert!(matches!(client.call(&cmd).await.unwrap(), Outcome::Error(_)));
        assert!(matches!(
            client.call(&cmd).await.unwrap(),
            Outcome::Exception(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_tag_is_protocol_error() {
        let (mut client, _server) = connect(vec![serde_json::json!(["partial", 1])]);
        let err = client.call(&protocol::refresh()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_server_hangup_is_closed() {
        let (mut client, server) = connect(vec![]);
        server.await.unwrap();
        let err = client.call(&protocol::refresh()).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Closed | BridgeError::Transport(_)
        ));
    }

    struct Canned(Outcome);

    impl Transport for Canned {
        async fn call(&mut self, _command: &Command) -> Result<Outcome, BridgeError> {
            Ok(self.0.clone())
        }

        fn generation(&self) -> u64 {
            1
        }
    }

    #[tokio::test]
    async fn test_request_deserializes_return() {
        let mut t = Canned(Outcome::Return(serde_json::json!({"line": 5, "col": 1})));
        let pos: Position = request(&mut t, &protocol::seek_end()).await.unwrap();
        assert_eq!(pos, Position::new(5, 1));
    }

    #[tokio::test]
    async fn test_request_shape_mismatch_names_command() {
        let mut t = Canned(Outcome::Return(serde_json::json!("nope")));
        let err = request::<_, Position>(&mut t, &protocol::seek_end())
            .await
            .unwrap_err();
        match err {
            BridgeError::UnexpectedPayload { command, .. } => assert_eq!(command, "seek end"),
            other => panic!("expected UnexpectedPayload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_surfaces_rejection() {
        let mut t = Canned(Outcome::Failure(serde_json::json!("nope")));
        let err = execute(&mut t, &protocol::refresh()).await.unwrap_err();
        assert!(err.is_rejection());
    }
}
