//! Responses produced by the balancer itself.
//!
//! Everything else the client sees is relayed verbatim from a backend.
//! Both replies carry an empty body and close the connection.

/// Why the balancer answered instead of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The healthy set was empty.
    NoHealthyBackend,
    /// The selected backend refused or timed out the connection.
    BackendConnectFailed,
}

impl Unavailable {
    pub fn reason(self) -> &'static str {
        match self {
            Unavailable::NoHealthyBackend => "Service Unavailable",
            Unavailable::BackendConnectFailed => "Backend Connection Failed",
        }
    }

    /// Short label used for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            Unavailable::NoHealthyBackend => "no_healthy_backend",
            Unavailable::BackendConnectFailed => "backend_connect_failed",
        }
    }

    /// Raw response bytes.
    pub fn response(self) -> &'static [u8] {
        match self {
            Unavailable::NoHealthyBackend => {
                b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            }
            Unavailable::BackendConnectFailed => {
                b"HTTP/1.1 503 Backend Connection Failed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            }
        }
    }
}
