//! The tutoring pipeline for Stockflow.
//!
//! A [`TutorSession`] turns a learner message into a reply:
//!
//! 1. **Retrieve** relevant notes from the built-in knowledge base
//! 2. **Build** the module's system prompt around them
//! 3. **Call** the remote tutor through the resilience gate
//! 4. **Fall back** to the offline tutor when the remote path is unavailable
//!
//! Every attempt is reported to the shared telemetry aggregator.

pub mod knowledge;
pub mod prompt;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use knowledge::{ContextRetriever, KnowledgeChunk, ScoredChunk};
pub use session::{TutorReply, TutorSession};
