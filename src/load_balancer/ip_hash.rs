//! IP hash load balancing strategy.
//!
//! The mapping depends on the size of the healthy set, so a client's
//! backend can change whenever any backend's health flips.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::load_balancer::{registry::BackendRegistry, SelectionPolicy};

/// Client-address affinity selector.
#[derive(Debug, Default)]
pub struct IpHash;

impl IpHash {
    pub fn new() -> Self {
        Self
    }

    /// `DefaultHasher::new()` uses fixed keys, so this is stable for a run.
    fn hash(client: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        client.hash(&mut hasher);
        hasher.finish()
    }
}

impl SelectionPolicy for IpHash {
    fn select(&self, healthy: &[usize], _registry: &BackendRegistry, client: &str) -> Option<usize> {
        if healthy.is_empty() {
            return None;
        }
        let slot = (Self::hash(client) % healthy.len() as u64) as usize;
        Some(healthy[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn registry() -> BackendRegistry {
        let addresses: Vec<_> = (0..5)
            .map(|i| BackendConfig::new("127.0.0.1", 9001 + i))
            .collect();
        BackendRegistry::new(&addresses)
    }

    #[test]
    fn same_client_same_backend() {
        let lb = IpHash::new();
        let registry = registry();
        let healthy = registry.healthy_indices();

        let first = lb.select(&healthy, &registry, "192.168.1.20").unwrap();
        for _ in 0..20 {
            assert_eq!(lb.select(&healthy, &registry, "192.168.1.20"), Some(first));
        }
    }

    #[test]
    fn pick_is_always_healthy() {
        let lb = IpHash::new();
        let registry = registry();
        registry.set_health(0, false);
        registry.set_health(3, false);
        let healthy = registry.healthy_indices();

        for i in 0..50 {
            let client = format!("10.0.0.{}", i);
            let pick = lb.select(&healthy, &registry, &client).unwrap();
            assert!(healthy.contains(&pick));
        }
    }

    #[test]
    fn spreads_clients() {
        let lb = IpHash::new();
        let registry = registry();
        let healthy = registry.healthy_indices();
        let picks: std::collections::HashSet<_> = (0..100)
            .map(|i| lb.select(&healthy, &registry, &format!("10.1.{}.{}", i / 10, i)).unwrap())
            .collect();
        assert!(picks.len() > 1);
    }

    #[test]
    fn empty_healthy_set_yields_none() {
        assert_eq!(IpHash::new().select(&[], &registry(), "10.0.0.1"), None);
    }
}
