//! TCP Load Balancer Library

pub mod config;
pub mod echo;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;

pub use config::schema::BalancerConfig;
pub use lifecycle::{LoadBalancer, Shutdown};
