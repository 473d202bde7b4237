//! Resilience gate: a circuit breaker in front of the inference backend.
//!
//! ```text
//! CLOSED ──(failures ≥ threshold)──▶ OPEN ──(cooldown elapsed, next call)──▶ HALF_OPEN
//!   ▲                                  ▲                                        │
//!   └────────────(probe succeeds)──────┼────────────────────────────────────────┤
//!                                      └────────────(probe fails)───────────────┘
//! ```
//!
//! The gate never retries. It only decides admit-or-reject, tracks the
//! consecutive-failure count, reports every state transition to telemetry,
//! and records one transaction for every operation it actually runs.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stockflow_core::InferenceError;
use stockflow_telemetry::{CircuitState, TelemetryAggregator, TransactionOutcome};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Breaker tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (while closed) that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is admitted.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Why `execute` did not return the operation's value.
#[derive(Debug, thiserror::Error)]
pub enum GateError<E> {
    /// Rejected without running the operation.
    #[error("Circuit breaker open: retry in {}ms", .retry_after.as_millis())]
    CircuitOpen { retry_after: Duration },

    /// The operation ran and failed.
    #[error("{0}")]
    Operation(E),
}

impl<E> GateError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

impl From<GateError<InferenceError>> for stockflow_core::Error {
    fn from(e: GateError<InferenceError>) -> Self {
        match e {
            GateError::CircuitOpen { retry_after } => stockflow_core::Error::CircuitOpen {
                retry_after_ms: retry_after.as_millis() as u64,
            },
            GateError::Operation(err) => stockflow_core::Error::Inference(err),
        }
    }
}

/// Point-in-time view of the breaker, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    /// Remaining cooldown while open.
    pub retry_after: Option<Duration>,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    failure_count: u32,
    /// Only meaningful while `circuit == Open`.
    opened_until: Option<Instant>,
    probe_in_flight: bool,
    /// Bumped on every state change and on reset. An attempt admitted under
    /// an older generation is a late result and cannot move the breaker.
    generation: u64,
}

/// What `admit` hands to an admitted attempt.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    generation: u64,
    probe: bool,
}

/// The circuit breaker.
///
/// Bookkeeping lives behind one `Mutex` that is never held across an await.
/// Telemetry is updated while that lock is held, so the published circuit
/// state always matches the breaker's own.
pub struct ResilienceGate {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    telemetry: Arc<TelemetryAggregator>,
}

impl ResilienceGate {
    pub fn new(config: CircuitBreakerConfig, telemetry: Arc<TelemetryAggregator>) -> Self {
        telemetry.set_circuit_state(CircuitState::Closed);
        Self {
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            state: Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                failure_count: 0,
                opened_until: None,
                probe_in_flight: false,
                generation: 0,
            }),
            telemetry,
        }
    }

    /// Gate with the default threshold (3) and cooldown (10s).
    pub fn with_defaults(telemetry: Arc<TelemetryAggregator>) -> Self {
        Self::new(CircuitBreakerConfig::default(), telemetry)
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<TelemetryAggregator> {
        &self.telemetry
    }

    /// Run `operation` if the circuit admits it.
    ///
    /// The closure is not called at all when the call is rejected. If the
    /// returned future is dropped after admission, the attempt is recorded
    /// as a cancelled failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let ticket = self
            .admit()
            .map_err(|retry_after| GateError::CircuitOpen { retry_after })?;

        let mut attempt = Attempt {
            gate: self,
            ticket,
            started: Instant::now(),
            settled: false,
        };

        let result = operation().await;
        attempt.settled = true;
        let latency = attempt.started.elapsed();

        match &result {
            Ok(_) => self.on_success(ticket, latency),
            Err(e) => self.on_failure(ticket, latency, e.to_string()),
        }

        result.map_err(GateError::Operation)
    }

    /// Current breaker state.
    pub fn state(&self) -> CircuitState {
        self.lock().circuit
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock();
        let retry_after = match (state.circuit, state.opened_until) {
            (CircuitState::Open, Some(until)) => {
                Some(until.saturating_duration_since(Instant::now()))
            }
            _ => None,
        };
        BreakerSnapshot {
            state: state.circuit,
            failure_count: state.failure_count,
            failure_threshold: self.config.failure_threshold,
            cooldown: self.config.cooldown,
            retry_after,
            probe_in_flight: state.probe_in_flight,
        }
    }

    /// Force the circuit closed and forget failure history.
    ///
    /// Attempts still in flight settle as late results.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.failure_count = 0;
        state.opened_until = None;
        state.probe_in_flight = false;
        state.generation += 1;
        self.transition(&mut state, CircuitState::Closed);
        info!("Circuit breaker manually reset");
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// Decide whether a call may proceed; `Err` carries the remaining cooldown.
    fn admit(&self) -> Result<Ticket, Duration> {
        let mut state = self.lock();
        let now = Instant::now();

        let probe = match state.circuit {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let until = state.opened_until.unwrap_or(now);
                if now <= until {
                    let retry_after = until - now;
                    debug!(retry_after_ms = retry_after.as_millis() as u64, "Circuit open, rejecting call");
                    return Err(retry_after);
                }
                self.transition(&mut state, CircuitState::HalfOpen);
                state.opened_until = None;
                state.probe_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    debug!("Probe already in flight, rejecting call");
                    return Err(Duration::ZERO);
                }
                state.probe_in_flight = true;
                true
            }
        };

        Ok(Ticket {
            generation: state.generation,
            probe,
        })
    }

    fn on_success(&self, ticket: Ticket, latency: Duration) {
        let mut state = self.lock();

        if ticket.generation != state.generation {
            debug!(state = %state.circuit, "Late success, breaker state unchanged");
        } else if ticket.probe {
            state.probe_in_flight = false;
            state.failure_count = 0;
            self.transition(&mut state, CircuitState::Closed);
        } else {
            state.failure_count = 0;
        }

        self.telemetry
            .record_transaction(TransactionOutcome::success(latency));
    }

    fn on_failure(&self, ticket: Ticket, latency: Duration, error: String) {
        let mut state = self.lock();

        if ticket.generation != state.generation {
            debug!(state = %state.circuit, error = %error, "Late failure, breaker state unchanged");
        } else if ticket.probe {
            state.failure_count = state.failure_count.saturating_add(1);
            state.probe_in_flight = false;
            warn!(error = %error, "Half-open probe failed, reopening circuit");
            self.open(&mut state);
        } else {
            state.failure_count = state.failure_count.saturating_add(1);
            warn!(
                error = %error,
                failures = state.failure_count,
                threshold = self.config.failure_threshold,
                "Guarded operation failed"
            );
            if state.failure_count >= self.config.failure_threshold {
                self.open(&mut state);
            }
        }

        self.telemetry
            .record_transaction(TransactionOutcome::failure(latency, error));
    }

    fn open(&self, state: &mut BreakerState) {
        state.opened_until = Some(Instant::now() + self.config.cooldown);
        self.transition(state, CircuitState::Open);
    }

    fn transition(&self, state: &mut BreakerState, next: CircuitState) {
        let previous = state.circuit;
        state.circuit = next;
        self.telemetry.set_circuit_state(next);
        if previous != next {
            state.generation += 1;
            info!(from = %previous, to = %next, "Circuit breaker transition");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks one admitted operation; records a failure if dropped unsettled.
struct Attempt<'a> {
    gate: &'a ResilienceGate,
    ticket: Ticket,
    started: Instant,
    settled: bool,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.on_failure(
                self.ticket,
                self.started.elapsed(),
                "operation cancelled before completion".into(),
            );
        }
    }
}
