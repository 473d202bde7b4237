//! Local tutor backend, the degraded-mode responder.
//!
//! Runs entirely in-process with no network access. It frames the learner's
//! question in Systems Thinking terms and, when the request carries
//! retrieved context, quotes it back as study notes. Used as the fallback
//! when the remote backend is failing or the circuit is open.

use async_trait::async_trait;
use stockflow_core::{ChatReply, ChatRequest, InferenceBackend, InferenceError, ModuleType};

/// Status string attached to every locally generated reply.
pub const SIMULATION_STATUS: &str = "DEGRADED (Simulation Mode)";

/// Deterministic offline responder.
#[derive(Debug, Default, Clone)]
pub struct LocalTutorBackend;

impl LocalTutorBackend {
    pub fn new() -> Self {
        Self
    }

    fn analogy(module: ModuleType) -> &'static str {
        match module {
            ModuleType::Python => {
                "Treat variables as stocks, functions as flows, and loops as feedback: \
                 a `while` loop is a balancing loop that stops once its goal is reached."
            }
            ModuleType::PromptEng => {
                "Treat the prompt as the stock of context the model draws on, and each \
                 instruction or example as a flow that reshapes it; few-shot examples \
                 and chain-of-thought are leverage points."
            }
        }
    }
}

#[async_trait]
impl InferenceBackend for LocalTutorBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, InferenceError> {
        let question = request.message.trim();
        if question.is_empty() {
            return Err(InferenceError::Api {
                status_code: 400,
                message: "empty message".into(),
            });
        }

        let mut text = format!(
            "**Offline tutor ({})**\n\nYou asked: \"{}\"\n\n{}",
            request.module.subject(),
            question,
            Self::analogy(request.module)
        );

        if let Some(context) = &request.context {
            text.push_str("\n\nFrom the knowledge base:\n");
            text.push_str(context);
        }

        text.push_str(
            "\n\nThe live tutor is unreachable right now, so this answer was composed locally.",
        );

        Ok(ChatReply {
            text,
            backend_latency_ms: None,
            used_rag: request.used_rag(),
            system_status: Some(SIMULATION_STATUS.into()),
            suggested_actions: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_quotes_context_when_present() {
        let backend = LocalTutorBackend::new();
        let request = ChatRequest::new("what are loops?", ModuleType::Python)
            .with_context(Some("[RETRIEVED CONTEXT]\n[Python Foundation]".into()));

        let reply = backend.complete(request).await.unwrap();
        assert!(reply.text.contains("Offline tutor (Python)"));
        assert!(reply.text.contains("[Python Foundation]"));
        assert!(reply.used_rag);
        assert_eq!(reply.system_status.as_deref(), Some(SIMULATION_STATUS));
    }

    #[tokio::test]
    async fn reply_without_context() {
        let backend = LocalTutorBackend::new();
        let reply = backend
            .complete(ChatRequest::new("few-shot?", ModuleType::PromptEng))
            .await
            .unwrap();
        assert!(reply.text.contains("Prompt Engineering"));
        assert!(!reply.text.contains("From the knowledge base"));
        assert!(!reply.used_rag);
    }

    #[tokio::test]
    async fn deterministic_for_identical_requests() {
        let backend = LocalTutorBackend::new();
        let a = backend
            .complete(ChatRequest::new("stocks", ModuleType::Python))
            .await
            .unwrap();
        let b = backend
            .complete(ChatRequest::new("stocks", ModuleType::Python))
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn blank_message_rejected() {
        let backend = LocalTutorBackend::new();
        let err = backend
            .complete(ChatRequest::new("   ", ModuleType::Python))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Api { status_code: 400, .. }));
    }
}
