//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{registry::BackendRegistry, SelectionPolicy};

/// Round-robin selector.
///
/// One cursor is shared by all clients. It only ever moves forward and is
/// not reset when the healthy set changes size, so assignment can skew for
/// a moment after a health flip.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(&self, healthy: &[usize], _registry: &BackendRegistry, _client: &str) -> Option<usize> {
        if healthy.is_empty() {
            return None;
        }
        let cursor = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(healthy[cursor % healthy.len()])
    }
}
