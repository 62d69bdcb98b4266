//! Multipart body demultiplexer
//!
//! Splits a `multipart/*` body into parts (RFC 2046 section 5.1.1). The
//! demuxer is a pure state machine over a byte buffer; the caller feeds it
//! whatever the transport delivers and pulls complete parts out.
//!
//! ```text
//! preamble...\r\n
//! --boundary\r\n                  <- delimiter line
//! Content-Type: image/jpeg\r\n    <- part headers
//! Content-Length: 4\r\n
//! \r\n
//! <body>\r\n                      <- CRLF before a delimiter belongs to it
//! --boundary\r\n
//! ...
//! --boundary--                    <- close delimiter
//! ```
//!
//! Bare LF line endings are accepted as well.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::protocol::constants::{DEFAULT_MAX_PART_SIZE, MAX_HEADER_SIZE};

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Part {
    /// Look up a part header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared `Content-Length`, if present and numeric
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.trim().parse().ok()
    }

    /// Part body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the part, returning its body
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    /// Skipping everything before the first delimiter
    Preamble,
    /// Reading part header lines
    Headers,
    /// Searching for the delimiter that ends the body
    Body,
    /// Close delimiter seen
    Done,
}

/// What follows a delimiter candidate
enum DelimiterEnd {
    /// Another part starts after this offset
    Next(usize),
    /// Close delimiter (`--boundary--`)
    Close,
    /// Boundary text followed by something other than padding
    NotDelimiter,
}

/// Incremental multipart demultiplexer
#[derive(Debug)]
pub struct MultipartDemuxer {
    boundary: String,
    /// `--boundary`
    delimiter: Vec<u8>,
    /// `\n--boundary`
    nl_delimiter: Vec<u8>,
    buf: BytesMut,
    state: DemuxState,
    headers: Vec<(String, String)>,
    header_bytes: usize,
    scan_from: usize,
    max_part_size: usize,
}

impl MultipartDemuxer {
    /// Create a demuxer for the given boundary (without leading dashes)
    pub fn new(boundary: &str) -> Self {
        let delimiter = [b"--".as_slice(), boundary.as_bytes()].concat();
        let nl_delimiter = [b"\n".as_slice(), &delimiter].concat();

        Self {
            boundary: boundary.to_string(),
            delimiter,
            nl_delimiter,
            buf: BytesMut::with_capacity(64 * 1024),
            state: DemuxState::Preamble,
            headers: Vec::new(),
            header_bytes: 0,
            scan_from: 0,
            max_part_size: DEFAULT_MAX_PART_SIZE,
        }
    }

    /// Set the largest accepted part body
    pub fn with_max_part_size(mut self, max_part_size: usize) -> Self {
        self.max_part_size = max_part_size;
        self
    }

    /// The boundary this demuxer splits on
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Append received bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Buffer to read transport data into directly
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Whether the close delimiter has been seen
    pub fn is_done(&self) -> bool {
        self.state == DemuxState::Done
    }

    /// Extract the next complete part
    ///
    /// Returns `Ok(None)` when more data is needed (or the body is closed).
    pub fn next_part(&mut self) -> Result<Option<Part>, ProtocolError> {
        loop {
            match self.state {
                DemuxState::Preamble => {
                    if !self.skip_preamble() {
                        return Ok(None);
                    }
                }
                DemuxState::Headers => {
                    if !self.read_header_line()? {
                        return Ok(None);
                    }
                }
                DemuxState::Body => return self.read_body(),
                DemuxState::Done => return Ok(None),
            }
        }
    }

    fn skip_preamble(&mut self) -> bool {
        let mut search = 0;
        loop {
            let Some(found) = find(&self.buf[search..], &self.delimiter) else {
                // Keep only what could be the start of a delimiter
                let keep = self.nl_delimiter.len();
                if self.buf.len() > keep {
                    let discard = self.buf.len() - keep;
                    self.buf.advance(discard);
                }
                return false;
            };

            let pos = search + found;
            if pos > 0 && self.buf[pos - 1] != b'\n' {
                search = pos + 1;
                continue;
            }

            match self.delimiter_end(pos + self.delimiter.len()) {
                None => return false,
                Some(DelimiterEnd::NotDelimiter) => search = pos + 1,
                Some(DelimiterEnd::Close) => {
                    self.buf.clear();
                    self.state = DemuxState::Done;
                    return true;
                }
                Some(DelimiterEnd::Next(line_end)) => {
                    self.buf.advance(line_end);
                    self.state = DemuxState::Headers;
                    return true;
                }
            }
        }
    }

    fn read_header_line(&mut self) -> Result<bool, ProtocolError> {
        let Some(nl) = self.buf.iter().position(|&b| b == b'\n') else {
            if self.header_bytes + self.buf.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::HeaderTooLarge {
                    limit: MAX_HEADER_SIZE,
                });
            }
            return Ok(false);
        };

        let line = self.buf.split_to(nl + 1);
        self.header_bytes += line.len();
        if self.header_bytes > MAX_HEADER_SIZE {
            return Err(ProtocolError::HeaderTooLarge {
                limit: MAX_HEADER_SIZE,
            });
        }

        let line = trim_line_end(&line);
        if line.is_empty() {
            self.state = DemuxState::Body;
            self.scan_from = 0;
            return Ok(true);
        }

        let text = String::from_utf8_lossy(line);
        let (name, value) = text
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedPart(format!("header without ':': {text:?}")))?;
        self.headers
            .push((name.trim().to_string(), value.trim().to_string()));

        Ok(true)
    }

    fn read_body(&mut self) -> Result<Option<Part>, ProtocolError> {
        loop {
            // (end of body, start of delimiter)
            let found = if self.scan_from == 0 && self.buf.starts_with(&self.delimiter) {
                Some((0, 0))
            } else {
                find(&self.buf[self.scan_from..], &self.nl_delimiter).map(|idx| {
                    let nl = self.scan_from + idx;
                    let end = if nl > 0 && self.buf[nl - 1] == b'\r' {
                        nl - 1
                    } else {
                        nl
                    };
                    (end, nl + 1)
                })
            };

            let Some((body_end, delimiter_start)) = found else {
                if self.buf.len() > self.max_part_size + self.nl_delimiter.len() {
                    return Err(ProtocolError::PartTooLarge {
                        limit: self.max_part_size,
                    });
                }
                self.scan_from = self.buf.len().saturating_sub(self.nl_delimiter.len());
                return Ok(None);
            };

            if body_end > self.max_part_size {
                return Err(ProtocolError::PartTooLarge {
                    limit: self.max_part_size,
                });
            }

            match self.delimiter_end(delimiter_start + self.delimiter.len()) {
                None => {
                    // Delimiter line incomplete; rescan from it next time
                    self.scan_from = delimiter_start.saturating_sub(1);
                    return Ok(None);
                }
                Some(DelimiterEnd::NotDelimiter) => {
                    self.scan_from = delimiter_start.max(1);
                }
                Some(end) => return Ok(Some(self.take_part(body_end, end))),
            }
        }
    }

    fn take_part(&mut self, body_end: usize, end: DelimiterEnd) -> Part {
        let body = self.buf.split_to(body_end).freeze();
        let headers = std::mem::take(&mut self.headers);
        self.header_bytes = 0;
        self.scan_from = 0;

        match end {
            DelimiterEnd::Next(line_end) => {
                self.buf.advance(line_end - body_end);
                self.state = DemuxState::Headers;
            }
            DelimiterEnd::Close | DelimiterEnd::NotDelimiter => {
                self.buf.clear();
                self.state = DemuxState::Done;
            }
        }

        Part { headers, body }
    }

    /// Classify what follows a delimiter candidate ending at `after`
    ///
    /// Returns `None` if not enough data has arrived yet.
    fn delimiter_end(&self, after: usize) -> Option<DelimiterEnd> {
        let rest = self.buf.get(after..)?;
        match rest {
            [] | [b'-'] => return None,
            [b'-', b'-', ..] => return Some(DelimiterEnd::Close),
            _ => {}
        }
        // Transport padding up to the end of the line is ignored
        for (idx, &b) in rest.iter().enumerate() {
            match b {
                b'\n' => return Some(DelimiterEnd::Next(after + idx + 1)),
                b' ' | b'\t' | b'\r' => {}
                _ => return Some(DelimiterEnd::NotDelimiter),
            }
        }
        None
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
