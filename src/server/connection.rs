use std::os::fd::AsRawFd;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{Request, Response};
use crate::server::CommandEnvelope;

/// Serve one accepted control connection until the peer goes away.
///
/// Requests are read line by line and forwarded, already parsed, to the
/// event loop; the typed response comes back on a oneshot and is written
/// out before the next line is read. Peer disconnects (zero-length read,
/// broken writes, a partial line at EOF) close the connection silently
/// and are never treated as daemon failures.
pub async fn serve_connection(stream: UnixStream, commands: mpsc::Sender<CommandEnvelope>) {
    let fd = stream.as_raw_fd();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if line.last() != Some(&b'\n') {
                    // EOF mid-line: the fragment never became a request.
                    break;
                }
                line.pop();

                let response = handle_line(fd, &line, &commands).await;
                if write_half.write_all(&response.encode()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(fd, error = %e, "Read error on connection");
                break;
            }
        }
    }

    tracing::info!(fd, "Closing connection");
}

/// Turn one request line into a response, consulting the event loop for
/// anything that touches daemon state. Parse failures and a torn-down
/// server both collapse to a 500 for this caller only.
async fn handle_line(
    fd: i32,
    line: &[u8],
    commands: &mpsc::Sender<CommandEnvelope>,
) -> Response {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(e) => return Response::new(500, e.to_string()),
    };

    let request = match Request::parse(text) {
        Ok(request) => request,
        Err(e) => return Response::new(500, e.to_string()),
    };
    tracing::info!(fd, command = request.name(), "Command received");

    let (reply_tx, reply_rx) = oneshot::channel();
    let envelope = CommandEnvelope {
        request,
        reply: reply_tx,
    };
    if commands.send(envelope).await.is_err() {
        return Response::new(500, "server shutting down");
    }
    match reply_rx.await {
        Ok(response) => response,
        Err(_) => Response::new(500, "server shutting down"),
    }
}
