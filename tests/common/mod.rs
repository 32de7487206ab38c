//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tcp_balancer::config::{BackendConfig, BalancerConfig};
use tcp_balancer::echo::EchoServer;
use tcp_balancer::lifecycle::{LoadBalancer, Shutdown};
use tcp_balancer::load_balancer::{BackendRegistry, PolicyKind};
use tcp_balancer::net::Listener;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend with async support.
///
/// The request is read before the reply is written so the balancer's single
/// read always sees the whole response.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        if socket.read(&mut buf).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a backend that only counts accepted connections, then closes them.
pub async fn start_counting_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });
    (addr, accepted)
}

/// Start one of the crate's echo backends on an ephemeral port.
pub async fn start_echo_backend() -> SocketAddr {
    let server = EchoServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

/// An address nothing listens on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A balancer running in the background on an ephemeral port.
pub struct TestBalancer {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub status_path: PathBuf,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl TestBalancer {
    /// Stop accepting and wait for the health monitor's cycle to finish.
    ///
    /// Panics if the balancer is still running after ten seconds.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("balancer did not stop after shutdown")
            .unwrap();
    }
}

/// Config pointing at `backends`, listening on an ephemeral port.
pub fn balancer_config(backends: &[SocketAddr], policy: PolicyKind, dir: &TempDir) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backends = backends
        .iter()
        .map(|addr| BackendConfig::from(*addr))
        .collect::<Vec<_>>()
        .into();
    config.policy = policy;
    config.health_check.status_file = dir.path().join("status.txt").display().to_string();
    config
}

/// Spawn a balancer with the given config.
pub async fn spawn_balancer_with(config: BalancerConfig, dir: TempDir) -> TestBalancer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let status_path = PathBuf::from(&config.health_check.status_file);

    let balancer = LoadBalancer::new(config);
    let registry = balancer.registry();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(balancer.run(listener, shutdown.clone()));

    TestBalancer {
        addr,
        registry,
        status_path,
        shutdown,
        handle,
        _dir: dir,
    }
}

/// Spawn a balancer in front of `backends` with default timings.
pub async fn spawn_balancer(backends: &[SocketAddr], policy: PolicyKind) -> TestBalancer {
    let dir = tempfile::tempdir().unwrap();
    let config = balancer_config(backends, policy, &dir);
    spawn_balancer_with(config, dir).await
}

/// Send raw bytes and read until the balancer closes the connection.
pub async fn send_request(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    response
}

/// Body of a plain `POST /` request.
pub fn post(body: &str) -> Vec<u8> {
    format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// Port the echo backend reported in its reply.
pub fn echoed_port(response: &[u8]) -> Option<u16> {
    let text = String::from_utf8_lossy(response);
    let start = text.find("Echo from port: ")? + "Echo from port: ".len();
    let rest = &text[start..];
    let end = rest.find(':')?;
    rest[..end].parse().ok()
}
