//! Just enough HTTP/1.1 to serve the playground: one request per connection, no chunked
//! bodies, no keep-alive.
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_HEADER_BYTES: usize = 64 * 1024;
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
/// A client gets this long to send a whole request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// The request target without its query string.
    pub path: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Failed to read the request")]
    Io(#[from] std::io::Error),
    #[error("The connection was closed before the request was complete")]
    Incomplete,
    #[error("The request headers are too large")]
    HeadersTooLarge,
    #[error("The request body is too large")]
    BodyTooLarge,
    #[error("Invalid HTTP request line")]
    InvalidRequestLine,
    #[error("Invalid Content-Length header")]
    InvalidContentLength,
    #[error("The request was not received within {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl HttpError {
    pub fn status(&self) -> u16 {
        match self {
            HttpError::HeadersTooLarge => 431,
            HttpError::BodyTooLarge => 413,
            HttpError::Timeout(_) => 408,
            _ => 400,
        }
    }
}

/// Read a single request from `stream`, giving up after [`READ_TIMEOUT`].
pub async fn read_request<R>(stream: &mut R) -> Result<Request, HttpError>
where
    R: AsyncRead + Unpin,
{
    read_request_within(stream, READ_TIMEOUT).await
}

/// Read a single request from `stream`, giving up once `deadline` has passed.
pub async fn read_request_within<R>(
    stream: &mut R,
    deadline: Duration,
) -> Result<Request, HttpError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(deadline, read_whole_request(stream))
        .await
        .map_err(|_| HttpError::Timeout(deadline))?
}

async fn read_whole_request<R>(stream: &mut R) -> Result<Request, HttpError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(position) = find_header_end(&buffer) {
            break position;
        }
        if buffer.len() > MAX_HEADER_BYTES {
            return Err(HttpError::HeadersTooLarge);
        }
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(HttpError::Incomplete);
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let header_text = String::from_utf8_lossy(&buffer[..header_end]);
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or(HttpError::InvalidRequestLine)?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::InvalidRequestLine);
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::InvalidRequestLine);
    }

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    let content_length = match headers.get("content-length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| HttpError::InvalidContentLength)?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(HttpError::BodyTooLarge);
    }

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(HttpError::Incomplete);
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    let path = target.split('?').next().unwrap_or(target).to_owned();
    Ok(Request {
        method: method.to_owned(),
        path,
        headers,
        body,
    })
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(200, "application/json", body),
            Err(e) => Self::text(500, format!("Failed to serialize the response: {e}")),
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.into())
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::text(405, "Method Not Allowed")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason(self.status),
            self.content_type,
            self.body.len()
        );
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    pub async fn write_to<W>(&self, stream: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.to_bytes()).await?;
        stream.flush().await
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
