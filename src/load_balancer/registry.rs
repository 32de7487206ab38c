//! Backend registry.
//!
//! # Responsibilities
//! - Hold the fixed, ordered backend list for the process lifetime
//! - Expose health flags, request counters and active counters by index
//! - Render the status snapshot consumed by external monitoring
//!
//! # Design Decisions
//! - Index is the stable identity used by every policy
//! - Health flags share one lock; the two counters are per-backend atomics,
//!   so probing and forwarding never contend on the same lock
//! - All backends start healthy

use std::fmt::Write as _;

use parking_lot::Mutex;

use crate::config::BackendConfig;
use crate::health::state::HealthState;
use crate::load_balancer::backend::{Backend, BackendConnectionGuard};

/// Point-in-time view of one backend, used for the status snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub address: BackendConfig,
    pub health: HealthState,
    pub requests: u64,
    pub active: usize,
}

/// Shared state for every configured backend.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
    health: Mutex<Vec<bool>>,
}

impl BackendRegistry {
    /// Build the registry from the ordered backend list.
    pub fn new(addresses: &[BackendConfig]) -> Self {
        Self {
            backends: addresses.iter().cloned().map(Backend::new).collect(),
            health: Mutex::new(vec![true; addresses.len()]),
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backend(&self, index: usize) -> Option<&Backend> {
        self.backends.get(index)
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Indices currently flagged healthy, in ascending order.
    ///
    /// The result may be stale by the time the caller uses it.
    pub fn healthy_indices(&self) -> Vec<usize> {
        let health = self.health.lock();
        health
            .iter()
            .enumerate()
            .filter_map(|(index, healthy)| healthy.then_some(index))
            .collect()
    }

    pub fn is_healthy(&self, index: usize) -> bool {
        self.health.lock().get(index).copied().unwrap_or(false)
    }

    /// Overwrite the health flag of a backend. Returns the previous flag.
    pub fn set_health(&self, index: usize, healthy: bool) -> Option<bool> {
        let mut health = self.health.lock();
        health
            .get_mut(index)
            .map(|flag| std::mem::replace(flag, healthy))
    }

    pub fn increment_requests(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.inc_requests();
        }
    }

    pub fn increment_active(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.inc_connections();
        }
    }

    pub fn decrement_active(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.dec_connections();
        }
    }

    /// Increment the active count of a backend, released when the guard drops.
    pub fn acquire(&self, index: usize) -> Option<BackendConnectionGuard<'_>> {
        self.backends.get(index).map(Backend::acquire)
    }

    /// Pick the index with the fewest active connections among `indices`.
    ///
    /// Ties go to the first occurrence in `indices`.
    pub fn least_loaded_among(&self, indices: &[usize]) -> Option<usize> {
        let mut selected: Option<(usize, usize)> = None;
        for &index in indices {
            let Some(backend) = self.backends.get(index) else {
                continue;
            };
            let active = backend.active_connections();
            match selected {
                Some((_, min)) if active >= min => {}
                _ => selected = Some((index, active)),
            }
        }
        selected.map(|(index, _)| index)
    }

    /// Copy the state of every backend, in index order.
    pub fn snapshot(&self) -> Vec<BackendStatus> {
        let health = self.health.lock().clone();
        self.backends
            .iter()
            .zip(health)
            .map(|(backend, healthy)| BackendStatus {
                address: backend.address().clone(),
                health: HealthState::from(healthy),
                requests: backend.request_count(),
                active: backend.active_connections(),
            })
            .collect()
    }

    /// Render the full status text. Built in memory so it can be written once.
    pub fn render_status(&self) -> String {
        let mut out = String::from("Health Status:\n");
        for status in self.snapshot() {
            let _ = writeln!(
                out,
                "{} [{}] Requests: {} Active: {}",
                status.address,
                status.health.label(),
                status.requests,
                status.active
            );
        }
        out
    }
}
