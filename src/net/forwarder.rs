//! Single-shot connection forwarding.
//!
//! # Protocol (per accepted client)
//! 1. Select a backend for the client address; none → 503
//! 2. Connect to it; failure → 503 with a distinct reason
//! 3. Hold one active connection on the backend
//! 4. One read from the client, written verbatim to the backend; failure aborts
//! 5. One read from the backend, written verbatim to the client; failure tolerated
//! 6. Count the request, release the active connection, close both sockets
//!
//! This is a TCP-level relay with one read per direction. It does not frame
//! HTTP, so a request or response larger than one read is truncated.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::config::BackendConfig;
use crate::http::Unavailable;
use crate::load_balancer::{BackendRegistry, Selector};
use crate::net::connection::{close_gracefully, ConnectionId};
use crate::observability::metrics;

/// Bytes relayed per direction.
const RELAY_BUFFER_SIZE: usize = 8192;

/// Failure on the client → backend leg. Only used for logging.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("backend connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("client closed before sending data")]
    ClientClosed,

    #[error("client read failed: {0}")]
    ClientRead(#[source] std::io::Error),

    #[error("backend write failed: {0}")]
    BackendWrite(#[source] std::io::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

/// How a forwarded connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The balancer answered with a 503 itself.
    Rejected(Unavailable),
    /// The client → backend leg failed; nothing was counted.
    Aborted { backend: usize },
    /// The request reached the backend. `response_bytes` may be zero.
    Forwarded { backend: usize, response_bytes: usize },
}

/// Relays one exchange per accepted connection.
#[derive(Debug)]
pub struct Forwarder {
    registry: Arc<BackendRegistry>,
    selector: Selector,
    relay_timeout: Duration,
}

impl Forwarder {
    pub fn new(registry: Arc<BackendRegistry>, selector: Selector, relay_timeout: Duration) -> Self {
        Self {
            registry,
            selector,
            relay_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Serve one client connection to completion.
    pub async fn handle(&self, mut client: TcpStream, peer: SocketAddr) -> Outcome {
        let id = ConnectionId::new();
        let client_ip = peer.ip().to_string();

        let selected = self
            .selector
            .select(&self.registry, &client_ip)
            .and_then(|index| self.registry.backend(index).map(|backend| (index, backend)));
        let Some((index, backend)) = selected else {
            tracing::warn!(connection_id = %id, client = %client_ip, "No healthy backends");
            return self.reject(client, Unavailable::NoHealthyBackend).await;
        };
        let address = backend.address();
        tracing::debug!(
            connection_id = %id,
            client = %client_ip,
            backend = %address,
            policy = %self.selector.kind(),
            "Backend selected"
        );

        let mut upstream = match self.connect(address).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(connection_id = %id, backend = %address, error = %e, "Backend connection failed");
                return self.reject(client, Unavailable::BackendConnectFailed).await;
            }
        };

        let active = backend.acquire();
        let mut buf = vec![0u8; RELAY_BUFFER_SIZE];

        if let Err(e) = self.forward_request(&mut client, &mut upstream, &mut buf).await {
            tracing::debug!(connection_id = %id, backend = %address, error = %e, "Relay aborted");
            metrics::record_aborted(&address.to_string());
            return Outcome::Aborted { backend: index };
        }

        let response_bytes = self.forward_response(&mut upstream, &mut client, &mut buf).await;
        if response_bytes == 0 {
            tracing::debug!(connection_id = %id, backend = %address, "Backend sent no response");
        }

        active.inc_requests();
        drop(active);
        drop(upstream);
        metrics::record_forwarded(&address.to_string());
        tracing::debug!(connection_id = %id, backend = %address, response_bytes, "Exchange complete");

        close_gracefully(client).await;
        Outcome::Forwarded {
            backend: index,
            response_bytes,
        }
    }

    async fn connect(&self, address: &BackendConfig) -> Result<TcpStream, ForwardError> {
        time::timeout(
            self.relay_timeout,
            TcpStream::connect((address.host.as_str(), address.port)),
        )
        .await
        .map_err(|_| ForwardError::Timeout("backend connect"))?
        .map_err(ForwardError::Connect)
    }

    async fn forward_request(
        &self,
        client: &mut TcpStream,
        upstream: &mut TcpStream,
        buf: &mut [u8],
    ) -> Result<(), ForwardError> {
        let n = time::timeout(self.relay_timeout, client.read(buf))
            .await
            .map_err(|_| ForwardError::Timeout("client read"))?
            .map_err(ForwardError::ClientRead)?;
        if n == 0 {
            return Err(ForwardError::ClientClosed);
        }

        time::timeout(self.relay_timeout, upstream.write_all(&buf[..n]))
            .await
            .map_err(|_| ForwardError::Timeout("backend write"))?
            .map_err(ForwardError::BackendWrite)
    }

    /// Best effort: any failure here leaves the exchange counted.
    async fn forward_response(&self, upstream: &mut TcpStream, client: &mut TcpStream, buf: &mut [u8]) -> usize {
        let n = match time::timeout(self.relay_timeout, upstream.read(buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Backend read failed");
                return 0;
            }
            Err(_) => {
                tracing::debug!("Backend read timed out");
                return 0;
            }
        };
        if n == 0 {
            return 0;
        }

        match time::timeout(self.relay_timeout, client.write_all(&buf[..n])).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Client write failed"),
            Err(_) => tracing::debug!("Client write timed out"),
        }
        n
    }

    async fn reject(&self, mut client: TcpStream, reason: Unavailable) -> Outcome {
        metrics::record_unavailable(reason.label());
        match time::timeout(self.relay_timeout, client.write_all(reason.response())).await {
            Ok(Ok(())) => close_gracefully(client).await,
            Ok(Err(e)) => tracing::debug!(error = %e, "Failed to send 503"),
            Err(_) => tracing::debug!("Sending 503 timed out"),
        }
        Outcome::Rejected(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::PolicyKind;
    use tokio::net::TcpListener;

    /// Backend that answers every connection's first read with `reply`.
    async fn backend(reply: &'static [u8]) -> BackendConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    if socket.read(&mut buf).await.unwrap_or(0) > 0 && !reply.is_empty() {
                        let _ = socket.write_all(reply).await;
                    }
                });
            }
        });
        addr.into()
    }

    fn refused() -> BackendConfig {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.into()
    }

    /// Run one forwarder invocation against a client that sends `request`.
    async fn exchange(forwarder: Arc<Forwarder>, request: &'static [u8]) -> (Outcome, Vec<u8>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            forwarder.handle(stream, peer).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        if !request.is_empty() {
            client.write_all(request).await.unwrap();
        } else {
            client.shutdown().await.unwrap();
        }
        let mut response = Vec::new();
        let _ = client.read_to_end(&mut response).await;
        drop(client);
        (server.await.unwrap(), response)
    }

    fn forwarder(backends: &[BackendConfig]) -> Arc<Forwarder> {
        Arc::new(Forwarder::new(
            Arc::new(BackendRegistry::new(backends)),
            Selector::new(PolicyKind::RoundRobin),
            Duration::from_secs(2),
        ))
    }

    #[tokio::test]
    async fn relays_one_exchange() {
        let b = backend(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi").await;
        let forwarder = forwarder(&[b]);

        let (outcome, response) = exchange(forwarder.clone(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(outcome, Outcome::Forwarded { backend: 0, response_bytes: response.len() });
        assert_eq!(response, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");

        let backend = forwarder.registry().backend(0).unwrap();
        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.active_connections(), 0);
    }

    #[tokio::test]
    async fn no_healthy_backend_gets_503() {
        let forwarder = forwarder(&[refused()]);
        forwarder.registry().set_health(0, false);

        let (outcome, response) = exchange(forwarder.clone(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(outcome, Outcome::Rejected(Unavailable::NoHealthyBackend));
        assert_eq!(response, Unavailable::NoHealthyBackend.response());
        assert_eq!(forwarder.registry().backend(0).unwrap().request_count(), 0);
    }

    #[tokio::test]
    async fn connect_failure_gets_distinct_503() {
        let forwarder = forwarder(&[refused()]);

        let (outcome, response) = exchange(forwarder.clone(), b"GET / HTTP/1.1\r\n\r\n").await;
        assert_eq!(outcome, Outcome::Rejected(Unavailable::BackendConnectFailed));
        assert_eq!(response, Unavailable::BackendConnectFailed.response());

        let backend = forwarder.registry().backend(0).unwrap();
        assert_eq!(backend.request_count(), 0);
        assert_eq!(backend.active_connections(), 0);
        // a failed forward never touches the health flag
        assert!(forwarder.registry().is_healthy(0));
    }

    #[tokio::test]
    async fn silent_client_aborts_without_counting() {
        let b = backend(b"HTTP/1.1 200 OK\r\n\r\n").await;
        let forwarder = forwarder(&[b]);

        let (outcome, response) = exchange(forwarder.clone(), b"").await;
        assert_eq!(outcome, Outcome::Aborted { backend: 0 });
        assert!(response.is_empty());

        let backend = forwarder.registry().backend(0).unwrap();
        assert_eq!(backend.request_count(), 0);
        assert_eq!(backend.active_connections(), 0);
    }

    #[tokio::test]
    async fn silent_backend_still_counts_request() {
        let b = backend(b"").await;
        let forwarder = forwarder(&[b]);

        let (outcome, response) = exchange(forwarder.clone(), b"POST / HTTP/1.1\r\n\r\n").await;
        assert_eq!(outcome, Outcome::Forwarded { backend: 0, response_bytes: 0 });
        assert!(response.is_empty());

        let backend = forwarder.registry().backend(0).unwrap();
        assert_eq!(backend.request_count(), 1);
        assert_eq!(backend.active_connections(), 0);
    }
}
