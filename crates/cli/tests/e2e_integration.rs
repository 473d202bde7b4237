//! End-to-end tests for the Stockflow tutoring pipeline.
//!
//! These exercise retrieval, the resilience gate, telemetry, and the
//! degraded-mode fallback together, the way the CLI wires them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use stockflow_agent::{ContextRetriever, TutorSession};
use stockflow_config::AppConfig;
use stockflow_core::{ChatReply, ChatRequest, Error, InferenceBackend, InferenceError, ModuleType};
use stockflow_providers::{LocalTutorBackend, ResilienceGate};
use stockflow_telemetry::{CircuitState, SystemStatus, TelemetryAggregator};

// ── Mock Backend ─────────────────────────────────────────────────────────

/// A backend that returns scripted results in sequence.
struct ScriptedBackend {
    results: Mutex<Vec<Result<ChatReply, InferenceError>>>,
    call_count: Mutex<usize>,
    delay: Duration,
}

impl ScriptedBackend {
    fn new(results: Vec<Result<ChatReply, InferenceError>>) -> Self {
        Self {
            results: Mutex::new(results),
            call_count: Mutex::new(0),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatReply, InferenceError> {
        let result = {
            let mut count = self.call_count.lock().unwrap();
            let results = self.results.lock().unwrap();
            if *count >= results.len() {
                panic!(
                    "ScriptedBackend exhausted: call #{}, have {}",
                    *count,
                    results.len()
                );
            }
            let result = results[*count].clone();
            *count += 1;
            result
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        result
    }
}

fn ok(text: &str) -> Result<ChatReply, InferenceError> {
    Ok(ChatReply::text(text))
}

fn unavailable() -> Result<ChatReply, InferenceError> {
    Err(InferenceError::Network("connection refused".into()))
}

fn session_with(primary: Arc<ScriptedBackend>) -> TutorSession {
    let telemetry = Arc::new(TelemetryAggregator::new());
    let gate = Arc::new(ResilienceGate::with_defaults(telemetry));
    TutorSession::new(Arc::new(ContextRetriever::builtin()), gate, primary)
        .with_fallback(Arc::new(LocalTutorBackend::new()))
}

// ── Pipeline ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_outage_fallback_and_recovery() {
    let primary = Arc::new(ScriptedBackend::new(vec![
        ok("Stocks accumulate."),
        unavailable(),
        unavailable(),
        unavailable(),
        ok("Welcome back."),
    ]));
    let mut session = session_with(primary.clone());
    let health = session.telemetry().subscribe();

    // Healthy turn.
    let reply = session.ask("what are stocks and flows?").await.unwrap();
    assert!(!reply.degraded);
    assert_eq!(session.telemetry().status(), SystemStatus::Healthy);

    // Three failures: each answered offline, third one opens the circuit.
    for _ in 0..3 {
        let reply = session.ask("explain feedback loops").await.unwrap();
        assert!(reply.degraded);
        assert!(reply.used_rag);
        assert!(reply.text.contains("[System Dynamics Core]"));
    }
    assert_eq!(session.gate().state(), CircuitState::Open);
    assert_eq!(health.borrow().status, SystemStatus::Down);

    // While open, the primary is not called at all.
    session.ask("still there?").await.unwrap();
    assert_eq!(primary.calls(), 4);

    // After the cooldown the probe succeeds and the circuit closes.
    tokio::time::advance(Duration::from_secs(11)).await;
    let reply = session.ask("are you back?").await.unwrap();
    assert_eq!(reply.text, "Welcome back.");
    assert!(!reply.degraded);

    let snap = session.telemetry().snapshot();
    assert_eq!(snap.circuit_state, CircuitState::Closed);
    // 5 primary calls + 4 fallbacks; 3 failures
    assert_eq!(snap.requests_total, 9);
    assert_eq!(snap.requests_failed, 3);
    assert_eq!(snap.status, SystemStatus::Degraded);
    assert_eq!(session.conversation().len(), 12);
}

#[tokio::test(start_paused = true)]
async fn e2e_slow_backend_degrades_on_latency() {
    let primary = Arc::new(
        ScriptedBackend::new((0..3).map(|_| ok("slow but fine")).collect())
            .with_delay(Duration::from_millis(3500)),
    );
    let mut session = session_with(primary.clone());

    for _ in 0..3 {
        let reply = session.ask("python variables").await.unwrap();
        assert!(!reply.degraded);
    }

    let snap = session.telemetry().snapshot();
    assert_eq!(snap.requests_failed, 0);
    assert_eq!(snap.average_latency, 3500);
    assert_eq!(snap.status, SystemStatus::Degraded);
    assert_eq!(snap.circuit_state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn e2e_module_switch_changes_offline_subject() {
    let primary = Arc::new(ScriptedBackend::new(vec![unavailable()]));
    let mut session = session_with(primary).with_module(ModuleType::Python);
    session.set_module(ModuleType::PromptEng);

    let reply = session.ask("what is chain of thought?").await.unwrap();
    assert!(reply.degraded);
    assert!(reply.text.contains("Offline tutor (Prompt Engineering)"));
    assert!(reply.text.contains("[Prompt Engineering Strategies]"));
}

// ── Config wiring ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_unreachable_backend_from_config() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = AppConfig::default();
    config.backend.url = format!("http://127.0.0.1:{port}/api/v1/chat");
    config.backend.timeout_ms = 2000;
    config.breaker.failure_threshold = 2;

    let mut session = TutorSession::from_config(&config).unwrap();
    for _ in 0..2 {
        let reply = session.ask("loops").await.unwrap();
        assert!(reply.degraded);
        assert_eq!(reply.backend, "local");
        assert_eq!(
            reply.system_status.as_deref(),
            Some("DEGRADED (Simulation Mode)")
        );
    }

    let snap = session.telemetry().snapshot();
    assert_eq!(snap.circuit_state, CircuitState::Open);
    assert_eq!(snap.status, SystemStatus::Down);
    assert_eq!(snap.requests_failed, 2);

    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["circuitBreakerState"], "OPEN");
    assert_eq!(json["status"], "DOWN");
}

#[tokio::test]
async fn e2e_fallback_disabled_surfaces_errors() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut config = AppConfig::default();
    config.backend.url = format!("http://127.0.0.1:{port}/chat");
    config.tutor.fallback_enabled = false;
    config.breaker.failure_threshold = 1;

    let mut session = TutorSession::from_config(&config).unwrap();
    assert!(matches!(
        session.ask("hello").await,
        Err(Error::Inference(InferenceError::Network(_)))
    ));
    assert!(matches!(
        session.ask("hello").await,
        Err(Error::CircuitOpen { .. })
    ));
    assert_eq!(session.telemetry().snapshot().requests_total, 1);
}
