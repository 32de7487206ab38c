//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → probe.rs for every backend, concurrently
//!     → Overwrite the registry's health flags (state.rs)
//!     → status.rs (write snapshot for external monitoring)
//! ```
//!
//! # Design Decisions
//! - Only the latest probe decides a backend's state (no thresholds)
//! - A failed forward never marks a backend unhealthy; only the next
//!   probe round does
//! - Health state is per-backend, probe failures never abort a round

pub mod active;
pub mod probe;
pub mod state;
pub mod status;

pub use active::HealthMonitor;
pub use probe::{Probe, ProbeError};
pub use state::HealthState;
pub use status::StatusFile;
