//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from the configured backend list
//! - Build the selection policy and the forwarder
//! - Start the health monitor
//! - Run the accept loop on an already-bound listener
//!
//! # Design Decisions
//! - Fail fast: config and bind errors happen before this point and are fatal
//! - The listener is bound by the caller so tests can use ephemeral ports

use std::sync::Arc;

use crate::config::BalancerConfig;
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BackendRegistry, Selector};
use crate::net::{Forwarder, Listener};

/// The assembled load balancer.
pub struct LoadBalancer {
    config: BalancerConfig,
    registry: Arc<BackendRegistry>,
    forwarder: Arc<Forwarder>,
}

impl LoadBalancer {
    /// Create a new load balancer with the given configuration.
    pub fn new(config: BalancerConfig) -> Self {
        let registry = Arc::new(BackendRegistry::new(&config.backends));
        let forwarder = Arc::new(Forwarder::new(
            registry.clone(),
            Selector::new(config.policy),
            config.timeouts.relay(),
        ));

        Self {
            config,
            registry,
            forwarder,
        }
    }

    /// Shared backend state, for inspection.
    pub fn registry(&self) -> Arc<BackendRegistry> {
        self.registry.clone()
    }

    /// Serve until `shutdown` fires.
    ///
    /// The accept loop stops at once; the health monitor is awaited so its
    /// current cycle completes.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) {
        let monitor_signal = shutdown.subscribe();
        let listener_signal = shutdown.subscribe();

        let monitor = HealthMonitor::new(self.registry.clone(), &self.config.health_check);
        let monitor = tokio::spawn(monitor.run(monitor_signal));

        tracing::info!(
            policy = %self.config.policy,
            backends = self.registry.len(),
            "Load balancer running"
        );

        listener.serve(self.forwarder, listener_signal).await;

        if let Err(e) = monitor.await {
            tracing::error!(error = %e, "Health monitor task failed");
        }
    }
}
