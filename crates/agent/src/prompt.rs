//! System prompt assembly.

use stockflow_core::ModuleType;

const INSTRUCTIONS: &str = "[INSTRUCTIONS]\n\
    - Explain concepts through Systems Thinking analogies (stocks, flows, feedback loops).\n\
    - When retrieved context is present, reference it explicitly.\n\
    - Keep answers concise and educational.";

/// Build the tutor's system prompt for a module, embedding retrieved
/// context when there is any.
pub fn system_prompt(module: ModuleType, context: Option<&str>) -> String {
    let context = context.unwrap_or("No additional context retrieved.");
    format!(
        "You are an expert AI tutor teaching {subject}.\n\n\
         [SYSTEMS THINKING CONTEXT]\n{context}\n\n\
         {INSTRUCTIONS}",
        subject = module.subject(),
    )
}
