//! `stockflow context`: inspect keyword retrieval.

use stockflow_agent::ContextRetriever;

use super::load_config;

pub async fn run(query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let retriever = ContextRetriever::builtin().with_top_k(config.retrieval.top_k);

    let ranked = retriever.rank(query);
    if ranked.is_empty() {
        println!("  No relevant context for \"{query}\".");
        return Ok(());
    }

    println!("  {:>5}  {:<14} tags", "score", "chunk");
    for (i, scored) in ranked.iter().enumerate() {
        let marker = if i < retriever.top_k() { "*" } else { " " };
        println!(
            "{marker} {:>5}  {:<14} {}",
            scored.score,
            scored.chunk.id,
            scored.chunk.tags.join(", ")
        );
    }
    println!();

    if let Some(block) = retriever.retrieve(query) {
        println!("{block}");
    }
    Ok(())
}
