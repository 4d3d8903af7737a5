use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ClientError;

/// A control response: status code, free-text message, and a body whose
/// byte length is declared in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub message: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize as `"{status:03} {length} {message}\n"` followed by the
    /// body bytes. The body carries no trailing terminator of its own.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{:03} {} {}\n", self.status, self.body.len(), self.message)
            .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    /// Read one response from `reader`: header line first, then exactly the
    /// declared number of body bytes.
    pub async fn read_from<R>(reader: &mut R) -> Result<Response, ClientError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header).await?;
        if header.last() != Some(&b'\n') {
            return Err(ClientError::MalformedHeader(
                String::from_utf8_lossy(&header).into_owned(),
            ));
        }
        header.pop();

        let header = String::from_utf8_lossy(&header).into_owned();
        let (status, length, message) = parse_header(&header)
            .ok_or_else(|| ClientError::MalformedHeader(header.clone()))?;

        let mut body = vec![0u8; length];
        reader.read_exact(&mut body).await?;

        Ok(Response {
            status,
            message,
            body,
        })
    }
}

fn parse_header(header: &str) -> Option<(u16, usize, String)> {
    let mut parts = header.splitn(3, ' ');
    let status = parts.next()?;
    if status.len() != 3 {
        return None;
    }
    let status = status.parse().ok()?;
    let length = parts.next()?.parse().ok()?;
    let message = parts.next().unwrap_or_default().to_string();
    Some((status, length, message))
}
