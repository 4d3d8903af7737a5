use std::path::Path;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::ClientError;
use crate::protocol::Response;

/// Client side of the control protocol.
///
/// One request per connection: connect, send a single request line, block
/// until the full header and declared-length body have arrived, then drop
/// the connection. `send` consumes the client to make that shape explicit.
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Ok(Self {
            stream: UnixStream::connect(path).await?,
        })
    }

    /// Send one request (command name first, then its arguments) and read
    /// the response. Fields may not contain NUL or newline; the framing has
    /// no escape mechanism.
    pub async fn send(mut self, fields: &[impl AsRef<str>]) -> Result<Response, ClientError> {
        let mut line = Vec::new();
        for (i, field) in fields.iter().enumerate() {
            let field = field.as_ref();
            if field.bytes().any(|b| b == 0 || b == b'\n') {
                return Err(ClientError::InvalidField);
            }
            if i > 0 {
                line.push(0);
            }
            line.extend_from_slice(field.as_bytes());
        }
        line.push(b'\n');

        self.stream.write_all(&line).await?;

        let mut reader = BufReader::new(self.stream);
        Response::read_from(&mut reader).await
    }
}
