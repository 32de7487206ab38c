//! Least Connections load balancing strategy.

use crate::load_balancer::{registry::BackendRegistry, SelectionPolicy};

/// Least connections selector.
/// Selects the healthy backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionPolicy for LeastConnections {
    fn select(&self, healthy: &[usize], registry: &BackendRegistry, _client: &str) -> Option<usize> {
        // In case of tie, the lowest index is selected
        registry.least_loaded_among(healthy)
    }
}
