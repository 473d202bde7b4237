//! # Stockflow Core
//!
//! Domain types, traits, and error definitions for the Stockflow tutor client.
//! This crate has **no runtime dependencies** beyond serde and async-trait: it
//! defines the domain model the other crates implement against.
//!
//! The inference call is defined as a trait here. Implementations live in
//! `stockflow-providers`, which keeps the resilience core testable with
//! scripted backends.

pub mod error;
pub mod inference;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use error::{Error, InferenceError, Result};
pub use inference::{ChatReply, ChatRequest, HistoryTurn, InferenceBackend};
pub use message::{Conversation, ConversationId, Message, ModuleType, Role};
