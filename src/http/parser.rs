//! Minimal HTTP/1.x byte parsing.
//!
//! Scoped to what the probe and the echo backend need: status-line 200
//! detection, the request line, `Content-Length` and `Connection:
//! keep-alive`. No chunked encoding, header folding or pipelining.

use thiserror::Error;

/// Status lines accepted as healthy.
const OK_STATUS_LINES: [&[u8]; 2] = [b"HTTP/1.1 200", b"HTTP/1.0 200"];

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("header block is incomplete")]
    Incomplete,

    #[error("malformed request line")]
    RequestLine,

    #[error("invalid Content-Length \"{0}\"")]
    ContentLength(String),
}

/// The parts of a request head the echo backend acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub content_length: usize,
    pub keep_alive: bool,
    /// Length of the head including the blank line.
    pub head_len: usize,
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// True if `response` contains an HTTP/1.0 or HTTP/1.1 200 status line.
pub fn has_ok_status(response: &[u8]) -> bool {
    OK_STATUS_LINES
        .iter()
        .any(|line| find(response, line).is_some())
}

/// First line of `bytes`, lossily decoded, for logging.
pub fn first_line(bytes: &[u8]) -> String {
    let end = find(bytes, b"\r\n").unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Offset just past the `\r\n\r\n` terminating the head, if present.
pub fn header_end(buf: &[u8]) -> Option<usize> {
    find(buf, HEADER_END).map(|pos| pos + HEADER_END.len())
}

/// Parse the request head at the start of `buf`.
pub fn parse_request_head(buf: &[u8]) -> Result<RequestHead, ParseError> {
    let head_len = header_end(buf).ok_or(ParseError::Incomplete)?;
    let head = String::from_utf8_lossy(&buf[..head_len - HEADER_END.len()]);
    let mut lines = head.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::RequestLine)?;
    let mut parts = request_line.split(' ');
    let (Some(method), Some(path), Some(_version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::RequestLine);
    };
    if method.is_empty() || path.is_empty() {
        return Err(ParseError::RequestLine);
    }

    let mut content_length = 0;
    let mut keep_alive = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| ParseError::ContentLength(value.to_string()))?;
        } else if name.eq_ignore_ascii_case("connection") {
            keep_alive = value.eq_ignore_ascii_case("keep-alive");
        }
    }

    Ok(RequestHead {
        method: method.to_string(),
        path: path.to_string(),
        content_length,
        keep_alive,
        head_len,
    })
}
