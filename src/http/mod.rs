//! HTTP byte-level helpers.
//!
//! The balancer relays bytes without framing them; these modules cover the
//! few places HTTP is looked at directly:
//! - parser.rs: status-line check for probes, request head for the echo backend
//! - response.rs: the 503 replies the balancer synthesizes itself

pub mod parser;
pub mod response;

pub use response::Unavailable;
