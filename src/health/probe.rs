//! Single-backend HTTP health probe.
//!
//! # Protocol
//! 1. Fresh TCP connection to the backend
//! 2. `GET <path> HTTP/1.1` with `Host` and `Connection: close`
//! 3. One read of whatever arrives within the timeout
//! 4. Healthy iff the bytes contain an HTTP/1.x 200 status line
//!
//! Each step is bounded by the same timeout. The socket is closed on drop.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::BackendConfig;
use crate::http::parser;

/// Bytes read from a probed backend.
const PROBE_READ_SIZE: usize = 1024;

/// Why a probe marked its backend unhealthy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("send failed: {0}")]
    Send(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("connection closed before any response")]
    Closed,

    #[error("unexpected status line \"{0}\"")]
    Status(String),
}

/// HTTP health probe settings.
#[derive(Debug, Clone)]
pub struct Probe {
    path: String,
    timeout: Duration,
}

impl Probe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw request sent to `host`.
    pub fn request(&self, host: &str) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path, host
        )
    }

    /// Probe one backend. `Ok` means healthy.
    pub async fn check(&self, backend: &BackendConfig) -> Result<(), ProbeError> {
        let mut stream = time::timeout(
            self.timeout,
            TcpStream::connect((backend.host.as_str(), backend.port)),
        )
        .await
        .map_err(|_| ProbeError::Timeout("connect"))?
        .map_err(ProbeError::Connect)?;

        let request = self.request(&backend.host);
        time::timeout(self.timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| ProbeError::Timeout("send"))?
            .map_err(ProbeError::Send)?;

        let mut buf = [0u8; PROBE_READ_SIZE];
        let n = time::timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| ProbeError::Timeout("read"))?
            .map_err(ProbeError::Read)?;
        if n == 0 {
            return Err(ProbeError::Closed);
        }

        let response = &buf[..n];
        if parser::has_ok_status(response) {
            Ok(())
        } else {
            Err(ProbeError::Status(parser::first_line(response)))
        }
    }
}
