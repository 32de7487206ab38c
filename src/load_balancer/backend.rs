//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track active connections (for Least Connections LB)
//! - Count fully forwarded requests

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::config::BackendConfig;

/// A single backend server and its load counters.
///
/// The health flag is not stored here: the registry keeps all flags behind
/// one lock so probing never touches the counters used on the hot path.
#[derive(Debug)]
pub struct Backend {
    /// The address of the backend.
    address: BackendConfig,
    /// Requests whose client leg reached the backend.
    request_count: AtomicU64,
    /// Number of forwarders currently holding this backend.
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a new backend with zeroed counters.
    pub fn new(address: BackendConfig) -> Self {
        Self {
            address,
            request_count: AtomicU64::new(0),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &BackendConfig {
        &self.address
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement active connection count. Saturates at zero.
    pub fn dec_connections(&self) {
        let _ = self.active_connections.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |current| current.checked_sub(1),
        );
    }

    pub fn inc_requests(&self) {
        self.request_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Create a guard that holds one active connection until dropped.
    pub fn acquire(&self) -> BackendConnectionGuard<'_> {
        self.inc_connections();
        BackendConnectionGuard { backend: self }
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard<'a> {
    backend: &'a Backend,
}

impl Deref for BackendConnectionGuard<'_> {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl Drop for BackendConnectionGuard<'_> {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}
