//! Data model for transaction outcomes, circuit state, and health snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Circuit state ─────────────────────────────────────────────────────────

/// Breaker state as seen by telemetry consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls are rejected without reaching the backend.
    Open,
    /// A single probe call is testing recovery.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

// ── Health status ─────────────────────────────────────────────────────────

/// Derived system health.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    #[default]
    Healthy,
    Degraded,
    Down,
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Degraded => write!(f, "DEGRADED"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

// ── Transaction outcome ───────────────────────────────────────────────────

/// One completed attempt, reported once to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// Wall-clock duration of the attempt.
    #[serde(with = "duration_ms")]
    pub latency: Duration,
    /// Whether the attempt produced a usable result.
    pub success: bool,
    /// Error description for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionOutcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            latency,
            success: true,
            error: None,
        }
    }

    pub fn failure(latency: Duration, error: impl Into<String>) -> Self {
        Self {
            latency,
            success: false,
            error: Some(error.into()),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

// ── Thresholds ────────────────────────────────────────────────────────────

/// Limits that drive status derivation and the latency window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Number of latency samples kept in the rolling window.
    pub window_size: usize,
    /// Error rate strictly above which the system is degraded.
    pub error_rate: f64,
    /// Average latency (ms) strictly above which the system is degraded.
    /// Compared against the exact mean, not the rounded figure reported in
    /// snapshots.
    pub latency_ms: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            window_size: 20,
            error_rate: 0.20,
            latency_ms: 3000,
        }
    }
}

impl HealthThresholds {
    /// Pure status derivation. An open circuit always wins.
    pub fn derive_status(
        &self,
        circuit_state: CircuitState,
        requests_total: u64,
        requests_failed: u64,
        mean_latency_ms: f64,
    ) -> SystemStatus {
        let error_rate = requests_failed as f64 / requests_total.max(1) as f64;

        if circuit_state == CircuitState::Open {
            SystemStatus::Down
        } else if error_rate > self.error_rate || mean_latency_ms > self.latency_ms as f64 {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        }
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// Read-only copy of the telemetry state, handed to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    /// Latency samples in the rolling window, oldest first (ms).
    pub recent_latencies: Vec<u64>,
    /// Mean of `recent_latencies`, rounded to whole ms.
    pub average_latency: u64,
    #[serde(rename = "circuitBreakerState")]
    pub circuit_state: CircuitState,
    pub status: SystemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// Fraction of recorded transactions that failed (0.0 when none).
    pub fn error_rate(&self) -> f64 {
        self.requests_failed as f64 / self.requests_total.max(1) as f64
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            requests_total: 0,
            requests_failed: 0,
            recent_latencies: Vec::new(),
            average_latency: 0,
            circuit_state: CircuitState::Closed,
            status: SystemStatus::Healthy,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
