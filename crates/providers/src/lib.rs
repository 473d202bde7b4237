//! Inference backends and the resilience gate that guards them.
//!
//! Backends implement `stockflow_core::InferenceBackend`. The remote backend
//! talks to the tutor service; the local backend answers offline when the
//! session falls back to degraded mode.

pub mod circuit_breaker;
pub mod local;
pub mod remote;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreakerConfig, GateError, ResilienceGate};
pub use local::LocalTutorBackend;
pub use remote::RemoteTutorBackend;
