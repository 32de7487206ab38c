//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (client address known)
//!     → registry.rs (snapshot of healthy indices)
//!     → Apply the configured policy:
//!         - round_robin.rs (rotate through the healthy set)
//!         - least_conn.rs (pick backend with fewest active connections)
//!         - ip_hash.rs (hash the client address onto the healthy set)
//!     → Return a backend index or "none available"
//! ```
//!
//! # Design Decisions
//! - Policy chosen once at startup, fixed for the process lifetime
//! - Policies only see indices; the registry owns all backend state
//! - Unhealthy backends excluded from selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod ip_hash;
pub mod least_conn;
pub mod registry;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use ip_hash::IpHash;
pub use least_conn::LeastConnections;
pub use registry::{BackendRegistry, BackendStatus};
pub use round_robin::RoundRobin;

/// A backend selection strategy.
pub trait SelectionPolicy: fmt::Debug + Send + Sync {
    /// Choose one of `healthy` (ascending backend indices) for `client`.
    ///
    /// Returns `None` only when `healthy` is empty.
    fn select(&self, healthy: &[usize], registry: &BackendRegistry, client: &str) -> Option<usize>;
}

/// Which selection strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    RoundRobin,
    #[serde(rename = "least")]
    LeastConnections,
    IpHash,
}

impl PolicyKind {
    /// Interpret a command-line policy name. Unknown names mean round robin.
    pub fn from_arg(arg: &str) -> Self {
        arg.parse().unwrap_or_default()
    }

    pub fn build(self) -> Box<dyn SelectionPolicy> {
        match self {
            PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
            PolicyKind::LeastConnections => Box::new(LeastConnections::new()),
            PolicyKind::IpHash => Box::new(IpHash::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::RoundRobin => "roundrobin",
            PolicyKind::LeastConnections => "least",
            PolicyKind::IpHash => "iphash",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a policy name that matches no strategy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown selection policy \"{0}\"")]
pub struct UnknownPolicy(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "roundrobin" => Ok(PolicyKind::RoundRobin),
            "least" => Ok(PolicyKind::LeastConnections),
            "iphash" => Ok(PolicyKind::IpHash),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Pairs the registry's healthy snapshot with the configured policy.
#[derive(Debug)]
pub struct Selector {
    kind: PolicyKind,
    policy: Box<dyn SelectionPolicy>,
}

impl Selector {
    pub fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            policy: kind.build(),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Pick a backend index for `client`, or `None` if nothing is healthy.
    pub fn select(&self, registry: &BackendRegistry, client: &str) -> Option<usize> {
        let healthy = registry.healthy_indices();
        self.policy.select(&healthy, registry, client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn parses_policy_names_case_insensitively() {
        assert_eq!(PolicyKind::from_arg("least"), PolicyKind::LeastConnections);
        assert_eq!(PolicyKind::from_arg("LEAST"), PolicyKind::LeastConnections);
        assert_eq!(PolicyKind::from_arg("IpHash"), PolicyKind::IpHash);
        assert_eq!(PolicyKind::from_arg("RoundRobin"), PolicyKind::RoundRobin);
    }

    #[test]
    fn unknown_policy_falls_back_to_round_robin() {
        assert_eq!(PolicyKind::from_arg("random"), PolicyKind::RoundRobin);
        assert_eq!(PolicyKind::from_arg(""), PolicyKind::RoundRobin);
        assert!("weighted".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn selector_returns_none_when_all_down() {
        let registry = BackendRegistry::new(&[
            BackendConfig::new("127.0.0.1", 9001),
            BackendConfig::new("127.0.0.1", 9002),
        ]);
        registry.set_health(0, false);
        registry.set_health(1, false);

        for kind in [PolicyKind::RoundRobin, PolicyKind::LeastConnections, PolicyKind::IpHash] {
            assert_eq!(Selector::new(kind).select(&registry, "10.0.0.1"), None);
        }
    }

    #[test]
    fn round_robin_skips_backend_until_recovered() {
        let registry = BackendRegistry::new(&[
            BackendConfig::new("127.0.0.1", 9001),
            BackendConfig::new("127.0.0.1", 9002),
            BackendConfig::new("127.0.0.1", 9003),
        ]);
        let selector = Selector::new(PolicyKind::RoundRobin);
        registry.set_health(1, false);

        let picks: Vec<_> = (0..4).map(|_| selector.select(&registry, "").unwrap()).collect();
        assert!(!picks.contains(&1));

        registry.set_health(1, true);
        let picks: Vec<_> = (0..3).map(|_| selector.select(&registry, "").unwrap()).collect();
        assert!(picks.contains(&1));
    }
}
