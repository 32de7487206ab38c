//! Echo backend.
//!
//! The upstream the balancer is deployed in front of: answers `GET /health`
//! with `200 OK` and echoes every other request body back, prefixed with the
//! port it listens on.
//!
//! # Design Decisions
//! - One task per connection, 5 second bound on every socket operation
//! - Keep-alive honored when the client asks for it; health requests always close
//! - Request heads larger than 64 KiB and bodies larger than 8 MiB are refused by
//!   closing the connection

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

use crate::http::parser::{self, RequestHead};
use crate::net::listener::accept_backoff;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;
const READ_CHUNK: usize = 4096;

/// A parsed request with its full body.
#[derive(Debug)]
struct Request {
    head: RequestHead,
    body: Vec<u8>,
}

/// Echo server bound to one port.
pub struct EchoServer {
    listener: TcpListener,
    port: u16,
}

impl EchoServer {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever.
    pub async fn run(self) {
        tracing::info!(port = self.port, "Backend server listening");
        let mut failures = 0u32;
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    failures = 0;
                    let port = self.port;
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, port).await {
                            tracing::debug!(peer = %peer, error = %e, "Client connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let pause = accept_backoff(failures);
                    tracing::warn!(error = %e, retry_in = ?pause, "Accept failed");
                    time::sleep(pause).await;
                }
            }
        }
    }
}

/// Response to a health probe.
pub fn health_response() -> Vec<u8> {
    let body = "OK";
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Response echoing `body` from the server on `port`.
pub fn echo_response(port: u16, body: &[u8], keep_alive: bool) -> Vec<u8> {
    let mut echo = format!("Echo from port: {}:\n", port).into_bytes();
    echo.extend_from_slice(body);

    let connection = if keep_alive { "keep-alive" } else { "close" };
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
        echo.len(),
        connection
    )
    .into_bytes();
    response.extend_from_slice(&echo);
    response
}

async fn handle_client(mut stream: TcpStream, port: u16) -> io::Result<()> {
    let mut pending = Vec::new();
    while let Some(request) = read_request(&mut stream, &mut pending).await? {
        if request.head.method == "GET" && request.head.path == "/health" {
            write(&mut stream, &health_response()).await?;
            break;
        }

        let keep_alive = request.head.keep_alive;
        write(&mut stream, &echo_response(port, &request.body, keep_alive)).await?;
        if !keep_alive {
            break;
        }
    }
    Ok(())
}

async fn write(stream: &mut TcpStream, bytes: &[u8]) -> io::Result<()> {
    time::timeout(SOCKET_TIMEOUT, stream.write_all(bytes))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
}

/// Append one read to `buf`. Returns the number of bytes read.
async fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    let n = time::timeout(SOCKET_TIMEOUT, stream.read(&mut chunk))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??;
    buf.extend_from_slice(&chunk[..n]);
    Ok(n)
}

/// Read the next request. `None` when the peer closed between requests.
async fn read_request(stream: &mut TcpStream, pending: &mut Vec<u8>) -> io::Result<Option<Request>> {
    while parser::header_end(pending).is_none() {
        if pending.len() > MAX_HEAD_SIZE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request head too large"));
        }
        if fill(stream, pending).await? == 0 {
            if pending.is_empty() {
                return Ok(None);
            }
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }

    let head = parser::parse_request_head(pending)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if head.content_length > MAX_BODY_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "request body too large"));
    }
    let total = head
        .head_len
        .checked_add(head.content_length)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "request length overflows"))?;
    while pending.len() < total {
        if fill(stream, pending).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }

    let body = pending[head.head_len..total].to_vec();
    pending.drain(..total);
    Ok(Some(Request { head, body }))
}
