//! Thread-safe telemetry aggregator: counts transactions, keeps a rolling
//! latency window, and derives system health.

use crate::model::*;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// The telemetry aggregator.
///
/// Thread-safe via a single `RwLock`: every mutation updates counters, the
/// latency window, the average and the status inside one write section, so
/// a reader never sees a half-applied transaction. Snapshots are owned copies.
pub struct TelemetryAggregator {
    thresholds: HealthThresholds,
    state: RwLock<AggregateState>,
    /// Published after every mutation, for dashboards that await changes.
    publisher: watch::Sender<TelemetrySnapshot>,
}

#[derive(Debug)]
struct AggregateState {
    requests_total: u64,
    requests_failed: u64,
    /// Oldest sample at the front.
    recent_latencies: VecDeque<u64>,
    /// Exact window mean; drives status.
    mean_latency: f64,
    /// `mean_latency` rounded to whole milliseconds; reported.
    average_latency: u64,
    circuit_state: CircuitState,
    status: SystemStatus,
    last_error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl AggregateState {
    fn new(window_size: usize) -> Self {
        Self {
            requests_total: 0,
            requests_failed: 0,
            recent_latencies: VecDeque::with_capacity(window_size + 1),
            mean_latency: 0.0,
            average_latency: 0,
            circuit_state: CircuitState::Closed,
            status: SystemStatus::Healthy,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    fn recompute_average(&mut self) {
        self.mean_latency = if self.recent_latencies.is_empty() {
            0.0
        } else {
            let sum: u64 = self.recent_latencies.iter().sum();
            sum as f64 / self.recent_latencies.len() as f64
        };
        self.average_latency = self.mean_latency.round() as u64;
    }

    fn to_snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            requests_total: self.requests_total,
            requests_failed: self.requests_failed,
            recent_latencies: self.recent_latencies.iter().copied().collect(),
            average_latency: self.average_latency,
            circuit_state: self.circuit_state,
            status: self.status,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl TelemetryAggregator {
    /// Create an aggregator with the default thresholds (20 samples, 20%, 3000ms).
    pub fn new() -> Self {
        Self::with_thresholds(HealthThresholds::default())
    }

    /// Create an aggregator with custom thresholds.
    ///
    /// A zero window size is treated as one sample.
    pub fn with_thresholds(mut thresholds: HealthThresholds) -> Self {
        thresholds.window_size = thresholds.window_size.max(1);
        let state = AggregateState::new(thresholds.window_size);
        let (publisher, _) = watch::channel(state.to_snapshot());
        Self {
            thresholds,
            state: RwLock::new(state),
            publisher,
        }
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    // ── Mutators ──────────────────────────────────────────────────────

    /// Fold one completed attempt into the aggregate.
    pub fn record_transaction(&self, outcome: TransactionOutcome) {
        let latency_ms = outcome.latency.as_millis() as u64;
        let mut state = self.write();

        state.requests_total += 1;
        if !outcome.success {
            state.requests_failed += 1;
            state.last_error = outcome.error.or_else(|| Some("unknown error".into()));
        }

        state.recent_latencies.push_back(latency_ms);
        while state.recent_latencies.len() > self.thresholds.window_size {
            state.recent_latencies.pop_front();
        }
        state.recompute_average();

        self.refresh(&mut state);

        tracing::debug!(
            success = outcome.success,
            latency_ms,
            total = state.requests_total,
            failed = state.requests_failed,
            average_latency_ms = state.average_latency,
            status = %state.status,
            "Transaction recorded"
        );
    }

    /// Overwrite the breaker state. Only the resilience gate calls this.
    pub fn set_circuit_state(&self, circuit_state: CircuitState) {
        let mut state = self.write();
        state.circuit_state = circuit_state;
        self.refresh(&mut state);
        tracing::debug!(circuit = %circuit_state, status = %state.status, "Circuit state reported");
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Copy of the current state.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.read().to_snapshot()
    }

    pub fn status(&self) -> SystemStatus {
        self.read().status
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.publisher.subscribe()
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// Re-derive status and publish. Must run under the write lock.
    fn refresh(&self, state: &mut AggregateState) {
        let previous = state.status;
        state.status = self.thresholds.derive_status(
            state.circuit_state,
            state.requests_total,
            state.requests_failed,
            state.mean_latency,
        );
        state.updated_at = Utc::now();

        if state.status != previous {
            tracing::info!(from = %previous, to = %state.status, "System status changed");
        }

        self.publisher.send_replace(state.to_snapshot());
    }

    fn read(&self) -> RwLockReadGuard<'_, AggregateState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AggregateState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new()
    }
}
