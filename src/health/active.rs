//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend health flags based on results
//! - Write the status snapshot after every round

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::Probe;
use crate::health::state::HealthState;
use crate::health::status::StatusFile;
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::load_balancer::BackendRegistry;
use crate::observability::metrics;

pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    probe: Probe,
    interval: Duration,
    status: StatusFile,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>, config: &HealthCheckConfig) -> Self {
        Self {
            registry,
            probe: Probe::new(config.path.clone(), config.timeout()),
            interval: config.interval(),
            status: StatusFile::new(&config.status_file),
        }
    }

    /// Probe every interval until shutdown.
    ///
    /// Shutdown is only observed between cycles: a pending sleep and the
    /// probe round after it complete before the loop exits.
    pub async fn run(self, shutdown: ShutdownSignal) {
        tracing::info!(
            interval = ?self.interval,
            path = %self.probe.path(),
            status_file = %self.status.path().display(),
            "Health monitor starting"
        );

        // Backends are assumed alive until the first round completes
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.check_all().await;

            if shutdown.is_triggered() {
                tracing::info!("Health monitor received shutdown signal, exiting loop");
                break;
            }
        }
    }

    /// Run one probe round over all backends, then write the snapshot.
    pub async fn check_all(&self) {
        let probes = self
            .registry
            .backends()
            .iter()
            .map(|backend| self.probe.check(backend.address()));
        let results = join_all(probes).await;

        for (index, result) in results.into_iter().enumerate() {
            let Some(backend) = self.registry.backend(index) else {
                continue;
            };
            let address = backend.address();
            if let Err(e) = &result {
                tracing::debug!(backend = %address, error = %e, "Health probe failed");
            }

            let state = HealthState::from(result.is_ok());
            let previous = self.registry.set_health(index, state.is_healthy());
            if previous != Some(state.is_healthy()) {
                tracing::info!(backend = %address, state = %state, "Backend health changed");
            }

            metrics::record_backend_health(&address.to_string(), state.is_healthy());
        }

        if let Err(e) = self.status.write(&self.registry.render_status()).await {
            tracing::warn!(
                path = %self.status.path().display(),
                error = %e,
                "Failed to write status snapshot"
            );
        }
    }
}
