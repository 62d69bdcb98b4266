//! Upstream HTTP connector
//!
//! Opens the upstream stream: sends a plain `HTTP/1.0` GET (so the body is
//! never chunked), validates the response head and hands the body to a
//! [`MultipartDemuxer`].
//!
//! ```text
//! Relay                                   Camera
//!   |------- GET /video HTTP/1.0 --------->|
//!   |<------ 200 OK -----------------------|
//!   |        Content-Type: multipart/...;  |
//!   |                      boundary=...    |
//!   |<------ --boundary / part ------------|
//!   |<------ --boundary / part ------------|
//!   |                 ...                  |
//! ```

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{ProtocolError, UpstreamError};
use crate::protocol::constants::{MAX_HEADER_SIZE, USER_AGENT};
use crate::protocol::{MediaType, MultipartDemuxer, Part};

use super::config::{IngestConfig, UpstreamUrl};

/// Bytes reserved in the body buffer before each read
const READ_CHUNK: usize = 32 * 1024;

/// Status line and headers of the upstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Parse a response head (status line and header lines)
    pub fn parse(head: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| ProtocolError::MalformedResponse("empty response".into()))?;
        let mut fields = status_line.splitn(3, ' ');
        let version = fields.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(ProtocolError::MalformedResponse(format!(
                "bad status line: {status_line:?}"
            )));
        }
        let status = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ProtocolError::MalformedResponse(format!("bad status code: {status_line:?}"))
            })?;
        let reason = fields.next().unwrap_or_default().trim().to_string();

        let headers = lines
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// Look up a header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An open upstream stream
pub struct UpstreamConnection<S = TcpStream> {
    stream: S,
    demuxer: MultipartDemuxer,
    read_timeout: Duration,
    head: ResponseHead,
}

impl UpstreamConnection<TcpStream> {
    /// Connect to the configured upstream and validate its response
    pub async fn connect(config: &IngestConfig) -> Result<Self, UpstreamError> {
        let addr = config.url.socket_addr();

        let open = async {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|source| UpstreamError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            stream.set_nodelay(true)?;
            Self::handshake(stream, config).await
        };

        tokio::time::timeout(config.connect_timeout, open)
            .await
            .map_err(|_| UpstreamError::Timeout("connect", config.connect_timeout))?
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> UpstreamConnection<S> {
    /// Send the request over `stream` and validate the response head
    pub async fn handshake(mut stream: S, config: &IngestConfig) -> Result<Self, UpstreamError> {
        stream.write_all(&build_request(&config.url)).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(4096);
        let head_len = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            if buf.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::HeaderTooLarge {
                    limit: MAX_HEADER_SIZE,
                }
                .into());
            }
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(UpstreamError::Closed);
            }
        };

        let head = ResponseHead::parse(&buf.split_to(head_len))?;
        if !(200..300).contains(&head.status) {
            return Err(UpstreamError::Status {
                status: head.status,
                reason: head.reason,
            });
        }

        let content_type = head
            .header("content-type")
            .ok_or(UpstreamError::MissingContentType)?;
        let media_type = MediaType::parse(content_type)?;
        if !media_type.is_multipart() {
            return Err(ProtocolError::NotMultipart(media_type.essence).into());
        }
        let announced = media_type
            .param("boundary")
            .ok_or(ProtocolError::MissingBoundary)?;
        let boundary = config.boundary_quirk.apply(announced)?;

        tracing::debug!(
            status = head.status,
            content_type = content_type,
            boundary = %boundary,
            "Upstream response accepted"
        );

        let mut demuxer =
            MultipartDemuxer::new(&boundary).with_max_part_size(config.max_part_size);
        // Body bytes that arrived together with the head
        demuxer.feed(&buf);

        Ok(Self {
            stream,
            demuxer,
            read_timeout: config.read_timeout,
            head,
        })
    }

    /// The validated response head
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Boundary in use after the quirk transform
    pub fn boundary(&self) -> &str {
        self.demuxer.boundary()
    }

    /// Read the next part
    ///
    /// Returns `Ok(None)` once the close delimiter has been read. A
    /// connection that ends without one yields [`UpstreamError::Closed`].
    pub async fn next_part(&mut self) -> Result<Option<Part>, UpstreamError> {
        let read_timeout = self.read_timeout;

        loop {
            if let Some(part) = self.demuxer.next_part()? {
                return Ok(Some(part));
            }
            if self.demuxer.is_done() {
                return Ok(None);
            }

            let buf = self.demuxer.buffer_mut();
            buf.reserve(READ_CHUNK);
            let read = tokio::time::timeout(read_timeout, self.stream.read_buf(buf))
                .await
                .map_err(|_| UpstreamError::Timeout("read", read_timeout))??;
            if read == 0 {
                return Err(UpstreamError::Closed);
            }
        }
    }
}

fn build_request(url: &UpstreamUrl) -> Vec<u8> {
    format!(
        "GET {} HTTP/1.0\r\n\
         Host: {}\r\n\
         User-Agent: {}\r\n\
         Accept: multipart/x-mixed-replace, */*\r\n\
         Connection: close\r\n\
         \r\n",
        url.path,
        url.host_header(),
        USER_AGENT
    )
    .into_bytes()
}

/// Length of the response head including the blank line, if complete
fn find_head_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
