//! Message and Conversation domain types.
//!
//! A tutoring session is a sequence of messages between the learner and the
//! tutor model, scoped to one learning module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// Serialized as `"user"` / `"model"`, the names the tutor backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner
    User,
    /// The tutor model
    Model,
}

/// The learning module a conversation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleType {
    #[default]
    Python,
    PromptEng,
}

impl ModuleType {
    /// Human-readable subject name used in tutoring prompts.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::PromptEng => "Prompt Engineering",
        }
    }
}

impl std::fmt::Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::PromptEng => write!(f, "prompt_eng"),
        }
    }
}

impl std::str::FromStr for ModuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "python" | "py" => Ok(Self::Python),
            "prompt_eng" | "prompt" | "prompt_engineering" => Ok(Self::PromptEng),
            other => Err(format!("unknown module '{other}' (expected python or prompt_eng)")),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub text: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Round-trip latency of the request that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    /// Whether retrieved context was injected when producing this message
    #[serde(default)]
    pub used_rag: bool,
}

impl Message {
    /// Create a new learner message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(Role::User, text)
    }

    /// Create a new tutor message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role(Role::Model, text)
    }

    fn with_role(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            latency_ms: None,
            used_rag: false,
        }
    }
}

/// A conversation is an ordered sequence of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("What is a stock?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text, "What is a stock?");
        assert!(!msg.used_rag);
        assert!(msg.latency_ms.is_none());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let started = conv.updated_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= started);
        assert_ne!(conv.id, Conversation::new().id);
    }

    #[test]
    fn role_serializes_with_backend_names() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), "\"model\"");
    }

    #[test]
    fn module_parsing_accepts_aliases() {
        assert_eq!("python".parse::<ModuleType>().unwrap(), ModuleType::Python);
        assert_eq!("prompt-eng".parse::<ModuleType>().unwrap(), ModuleType::PromptEng);
        assert_eq!("PROMPT_ENG".parse::<ModuleType>().unwrap(), ModuleType::PromptEng);
        assert!("rust".parse::<ModuleType>().is_err());
    }

    #[test]
    fn module_wire_format() {
        let json = serde_json::to_string(&ModuleType::PromptEng).unwrap();
        assert_eq!(json, "\"PROMPT_ENG\"");
        assert_eq!(ModuleType::PromptEng.subject(), "Prompt Engineering");
    }
}
