//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per connection)
//!     → forwarder.rs (select backend, relay one request and one response)
//!     → connection.rs (connection ID, graceful close)
//! ```
//!
//! # Design Decisions
//! - Unbounded fan-out: no admission control on accepted connections
//! - Every connect/read/write is bounded by an explicit timeout
//! - A stalled peer only blocks its own task

pub mod connection;
pub mod forwarder;
pub mod listener;

pub use connection::ConnectionId;
pub use forwarder::{ForwardError, Forwarder, Outcome};
pub use listener::{Listener, ListenerError};
