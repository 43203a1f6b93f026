//! Metrics and monitoring for the lobby keeper
//!
//! Prometheus counters for reconciliation and lobby creation, plus the HTTP
//! server exposing them alongside a health endpoint.

pub mod collector;
pub mod health;

pub use collector::MetricsCollector;
pub use health::{HealthServer, HealthServerConfig, HealthServerState, HealthStatus};
