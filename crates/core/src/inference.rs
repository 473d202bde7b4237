//! Inference backend trait, the abstraction over the tutor model call.
//!
//! A backend takes the learner's message plus conversation history and
//! produces the tutor's reply. The resilience core treats it as an opaque
//! async operation that succeeds, fails, or times out.
//!
//! Implementations: remote HTTP tutor service, local degraded-mode responder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::message::{Message, ModuleType, Role};

/// One prior turn sent along with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

impl From<&Message> for HistoryTurn {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            text: m.text.clone(),
        }
    }
}

/// A request to the tutor model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The learner's new message
    pub message: String,

    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<HistoryTurn>,

    /// Which module the learner is studying
    pub module: ModuleType,

    /// System instructions, including any retrieved context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Retrieved context block injected into the system prompt
    #[serde(skip)]
    pub context: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, module: ModuleType) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            module,
            system_prompt: None,
            context: None,
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Whether retrieved context accompanies this request.
    pub fn used_rag(&self) -> bool {
        self.context.is_some()
    }
}

/// The tutor model's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Generated text
    pub text: String,

    /// Latency the backend measured on its side, if it reports one
    #[serde(default, rename = "latency_ms", skip_serializing_if = "Option::is_none")]
    pub backend_latency_ms: Option<f64>,

    /// Whether the backend grounded the reply in retrieved context
    #[serde(default)]
    pub used_rag: bool,

    /// Free-form health string reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_status: Option<String>,

    /// Follow-up prompts the backend suggests
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

impl ChatReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            backend_latency_ms: None,
            used_rag: false,
            system_status: None,
            suggested_actions: Vec::new(),
        }
    }
}

/// The core Backend trait.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name (e.g., "remote", "local")
    fn name(&self) -> &str;

    /// Produce a reply for the request.
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_prompt_and_rag_flag() {
        let req = ChatRequest::new("what is a loop?", ModuleType::Python)
            .with_history(vec![HistoryTurn::from(&Message::user("hi"))])
            .with_system_prompt("You are a tutor")
            .with_context(Some("[RETRIEVED CONTEXT]\nloops".into()));
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.history[0].role, Role::User);
        assert!(req.used_rag());
        assert_eq!(req.system_prompt.as_deref(), Some("You are a tutor"));
    }

    #[test]
    fn reply_decodes_backend_contract() {
        let json = r#"{
            "text": "Variables are stocks.",
            "latency_ms": 812.5,
            "used_rag": true,
            "system_status": "HEALTHY"
        }"#;
        let reply: ChatReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.text, "Variables are stocks.");
        assert_eq!(reply.backend_latency_ms, Some(812.5));
        assert!(reply.used_rag);
        assert!(reply.suggested_actions.is_empty());
    }

    #[test]
    fn request_omits_local_only_fields() {
        let req = ChatRequest::new("hello", ModuleType::PromptEng);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["module"], "PROMPT_ENG");
        assert!(json.get("context").is_none());
        assert!(json.get("system_prompt").is_none());
    }
}
