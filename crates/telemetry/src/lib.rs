//! Rolling transaction telemetry and health derivation for Stockflow.
//!
//! Counts requests and failures, keeps a fixed-size window of recent
//! latencies, and derives a `HEALTHY / DEGRADED / DOWN` status from the
//! error rate, the average latency, and the circuit breaker state.

pub mod engine;
pub mod model;
pub mod monitor;

pub use engine::TelemetryAggregator;
pub use monitor::spawn_health_poller;
pub use model::{
    CircuitState, HealthThresholds, SystemStatus, TelemetrySnapshot, TransactionOutcome,
};
