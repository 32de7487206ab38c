//! TCP Load Balancer
//!
//! Spreads incoming client connections across a fixed set of backend servers.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────┐
//!                     │               LOAD BALANCER                │
//!                     │                                            │
//!   Client ──────────▶│  listener ──▶ forwarder ──▶ policy         │
//!                     │                  │            │            │
//!                     │                  │            ▼            │
//!                     │                  │        registry ◀──┐    │
//!                     │                  │                    │    │
//!   Client ◀──────────│◀──── one read ───┴──── one read ──────┼────│──▶ Backend
//!                     │                                       │    │
//!                     │  health monitor ──────────────────────┘    │
//!                     │        └──▶ status file                    │
//!                     └────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```text
//! balancer [roundrobin|least|iphash] [--config <PATH>] [--port <PORT>]
//! ```

use std::path::PathBuf;

use clap::Parser;

use tcp_balancer::config::{load_config, BalancerConfig};
use tcp_balancer::lifecycle::{wait_for_signal, LoadBalancer, Shutdown};
use tcp_balancer::load_balancer::PolicyKind;
use tcp_balancer::net::Listener;
use tcp_balancer::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "balancer")]
#[command(about = "TCP load balancer with active health checks", long_about = None)]
struct Cli {
    /// Selection policy: roundrobin, least or iphash (unknown values mean roundrobin)
    policy: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port, overriding the configured bind address
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::default(),
    };
    if let Some(policy) = &cli.policy {
        config.policy = PolicyKind::from_arg(policy);
    }
    if let Some(port) = cli.port {
        config.listener = config.listener.with_port(port);
    }

    logging::init(&config.observability.log_level);

    tracing::info!("tcp-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        policy = %config.policy,
        backends = config.backends.len(),
        status_file = %config.health_check.status_file,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match Listener::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start listener");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    LoadBalancer::new(config).run(listener, shutdown).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
