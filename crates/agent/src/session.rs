//! Tutoring session.
//!
//! One learner turn flows through the session like this:
//!
//! 1. **Retrieve** keyword context for the message
//! 2. **Prompt**: build the module's system prompt around that context
//! 3. **Call** the primary backend through the resilience gate, bounded by
//!    the request timeout
//! 4. **Fall back** to the local backend when the gate rejects the call or
//!    the call fails, recording the substitute as its own transaction
//! 5. **Remember** both turns in the conversation

use std::sync::Arc;
use std::time::Duration;

use stockflow_config::AppConfig;
use stockflow_core::{
    ChatReply, ChatRequest, Conversation, Error, HistoryTurn, InferenceBackend, InferenceError,
    Message, ModuleType, Result,
};
use stockflow_providers::{
    CircuitBreakerConfig, LocalTutorBackend, RemoteTutorBackend, ResilienceGate,
};
use stockflow_telemetry::{HealthThresholds, TelemetryAggregator, TransactionOutcome};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::knowledge::ContextRetriever;
use crate::prompt;

/// Default bound on a single primary backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the learner sees for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TutorReply {
    pub text: String,
    /// Wall time for the whole turn, fallback included.
    pub latency: Duration,
    pub used_rag: bool,
    /// True when the reply came from the fallback backend.
    pub degraded: bool,
    pub backend: String,
    pub system_status: Option<String>,
    pub suggested_actions: Vec<String>,
}

pub struct TutorSession {
    retriever: Arc<ContextRetriever>,
    gate: Arc<ResilienceGate>,
    telemetry: Arc<TelemetryAggregator>,
    primary: Arc<dyn InferenceBackend>,
    fallback: Option<Arc<dyn InferenceBackend>>,
    timeout: Duration,
    module: ModuleType,
    conversation: Conversation,
}

impl TutorSession {
    /// Session without a fallback; telemetry is shared with the gate.
    pub fn new(
        retriever: Arc<ContextRetriever>,
        gate: Arc<ResilienceGate>,
        primary: Arc<dyn InferenceBackend>,
    ) -> Self {
        let telemetry = Arc::clone(gate.telemetry());
        Self {
            retriever,
            gate,
            telemetry,
            primary,
            fallback: None,
            timeout: DEFAULT_TIMEOUT,
            module: ModuleType::default(),
            conversation: Conversation::new(),
        }
    }

    /// Wire up the full stack from configuration: remote primary, local
    /// fallback when enabled.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let telemetry = Arc::new(TelemetryAggregator::with_thresholds(HealthThresholds {
            window_size: config.telemetry.window_size,
            error_rate: config.telemetry.error_rate_threshold,
            latency_ms: config.telemetry.latency_threshold_ms,
        }));
        let gate = Arc::new(ResilienceGate::new(
            CircuitBreakerConfig {
                failure_threshold: config.breaker.failure_threshold,
                cooldown: config.breaker.cooldown(),
            },
            telemetry,
        ));
        let retriever = Arc::new(ContextRetriever::builtin().with_top_k(config.retrieval.top_k));
        let primary = RemoteTutorBackend::new(
            config.backend.url.clone(),
            config.backend.api_key.clone(),
        )?;

        let mut session = Self::new(retriever, gate, Arc::new(primary))
            .with_timeout(config.backend.timeout())
            .with_module(config.default_module());
        if config.tutor.fallback_enabled {
            session = session.with_fallback(Arc::new(LocalTutorBackend::new()));
        }

        info!(
            backend = %config.backend.url,
            fallback = config.tutor.fallback_enabled,
            module = %session.module,
            "Tutor session ready"
        );
        Ok(session)
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn InferenceBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_module(mut self, module: ModuleType) -> Self {
        self.module = module;
        self
    }

    pub fn module(&self) -> ModuleType {
        self.module
    }

    pub fn set_module(&mut self, module: ModuleType) {
        if module != self.module {
            info!(from = %self.module, to = %module, "Switching module");
            self.module = module;
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Forget the conversation; breaker and telemetry state are kept.
    pub fn clear_history(&mut self) {
        let previous = std::mem::take(&mut self.conversation);
        info!(
            conversation = %previous.id,
            turns = previous.len() / 2,
            next = %self.conversation.id,
            "Conversation cleared"
        );
    }

    pub fn gate(&self) -> &Arc<ResilienceGate> {
        &self.gate
    }

    pub fn telemetry(&self) -> &Arc<TelemetryAggregator> {
        &self.telemetry
    }

    pub fn retriever(&self) -> &Arc<ContextRetriever> {
        &self.retriever
    }

    /// Answer one learner message.
    pub async fn ask(&mut self, message: &str) -> Result<TutorReply> {
        let started = Instant::now();

        let context = self.retriever.retrieve(message);
        let system_prompt = prompt::system_prompt(self.module, context.as_deref());
        let history: Vec<HistoryTurn> = self
            .conversation
            .messages
            .iter()
            .map(HistoryTurn::from)
            .collect();
        let request = ChatRequest::new(message, self.module)
            .with_history(history)
            .with_system_prompt(system_prompt)
            .with_context(context);

        debug!(
            conversation = %self.conversation.id,
            module = %self.module,
            used_rag = request.used_rag(),
            history = request.history.len(),
            "Dispatching tutor request"
        );

        let primary = Arc::clone(&self.primary);
        let timeout = self.timeout;
        let primary_request = request.clone();
        let outcome = self
            .gate
            .execute(move || async move {
                tokio::time::timeout(timeout, primary.complete(primary_request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(InferenceError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                        })
                    })
            })
            .await;

        let (reply, backend, degraded) = match outcome {
            Ok(reply) => (reply, self.primary.name().to_string(), false),
            Err(gate_error) => {
                let Some(fallback) = self.fallback.clone() else {
                    warn!(error = %gate_error, "Tutor request failed, no fallback configured");
                    return Err(gate_error.into());
                };
                warn!(
                    error = %gate_error,
                    fallback = fallback.name(),
                    "Primary backend unavailable, falling back"
                );
                let reply = self.run_fallback(fallback.as_ref(), request).await?;
                (reply, fallback.name().to_string(), true)
            }
        };

        let latency = started.elapsed();
        self.remember(message, &reply, latency);

        info!(
            conversation = %self.conversation.id,
            backend = %backend,
            latency_ms = latency.as_millis() as u64,
            used_rag = reply.used_rag,
            degraded,
            "Tutor reply"
        );

        Ok(TutorReply {
            text: reply.text,
            latency,
            used_rag: reply.used_rag,
            degraded,
            backend,
            system_status: reply.system_status,
            suggested_actions: reply.suggested_actions,
        })
    }

    async fn run_fallback(
        &self,
        fallback: &dyn InferenceBackend,
        request: ChatRequest,
    ) -> Result<ChatReply> {
        let mut pending = FallbackAttempt {
            telemetry: &self.telemetry,
            started: Instant::now(),
            settled: false,
        };

        let result = fallback.complete(request).await;
        pending.settled = true;
        let latency = pending.started.elapsed();

        match result {
            Ok(reply) => {
                self.telemetry
                    .record_transaction(TransactionOutcome::success(latency));
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "Fallback backend failed");
                self.telemetry
                    .record_transaction(TransactionOutcome::failure(latency, e.to_string()));
                Err(Error::Inference(e))
            }
        }
    }

    fn remember(&mut self, question: &str, reply: &ChatReply, latency: Duration) {
        self.conversation.push(Message::user(question));
        let mut answer = Message::model(reply.text.clone());
        answer.latency_ms = Some(latency.as_millis() as u64);
        answer.used_rag = reply.used_rag;
        self.conversation.push(answer);
    }
}

/// Records a fallback call dropped mid-flight as a failed transaction.
struct FallbackAttempt<'a> {
    telemetry: &'a TelemetryAggregator,
    started: Instant,
    settled: bool,
}

impl Drop for FallbackAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let cancelled = InferenceError::Cancelled("fallback dropped before completion".into());
            self.telemetry.record_transaction(TransactionOutcome::failure(
                self.started.elapsed(),
                cancelled.to_string(),
            ));
        }
    }
}
