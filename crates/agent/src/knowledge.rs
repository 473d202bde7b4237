//! Keyword context retrieval over a fixed in-memory corpus.
//!
//! Scoring is lexical: for every query token, an exact tag match is worth
//! two points and a case-insensitive substring hit in the content is worth
//! one. The best chunks are concatenated under a header and injected into
//! the tutor's system prompt.

use tracing::debug;

/// Marker placed before retrieved context.
pub const CONTEXT_HEADER: &str = "[RETRIEVED CONTEXT]";

/// Default number of chunks injected per query.
pub const DEFAULT_TOP_K: usize = 2;

/// An immutable corpus entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeChunk {
    pub id: String,
    /// Lower-case tags.
    pub tags: Vec<String>,
    pub content: String,
}

impl KnowledgeChunk {
    pub fn new<I, S>(id: impl Into<String>, tags: I, content: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id: id.into(),
            tags: tags.into_iter().map(|t| t.as_ref().to_lowercase()).collect(),
            content: content.into(),
        }
    }
}

/// A chunk paired with its score for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a KnowledgeChunk,
    pub score: u32,
}

#[derive(Debug)]
struct IndexedChunk {
    chunk: KnowledgeChunk,
    content_lower: String,
}

/// Stateless retriever; safe to share across tasks without locking.
#[derive(Debug)]
pub struct ContextRetriever {
    corpus: Vec<IndexedChunk>,
    top_k: usize,
}

impl ContextRetriever {
    pub fn new(corpus: Vec<KnowledgeChunk>) -> Self {
        let corpus = corpus
            .into_iter()
            .map(|chunk| IndexedChunk {
                content_lower: chunk.content.to_lowercase(),
                chunk,
            })
            .collect();
        Self {
            corpus,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Retriever over the built-in tutoring corpus.
    pub fn builtin() -> Self {
        Self::new(builtin_corpus())
    }

    /// Limit the number of chunks returned (minimum 1).
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// All chunks with a positive score, best first; ties keep corpus order.
    pub fn rank(&self, query: &str) -> Vec<ScoredChunk<'_>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredChunk<'_>> = self
            .corpus
            .iter()
            .map(|indexed| ScoredChunk {
                chunk: &indexed.chunk,
                score: score(indexed, &tokens),
            })
            .filter(|s| s.score > 0)
            .collect();

        // stable: equal scores stay in corpus order
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored
    }

    /// Context block for the query, or `None` when nothing is relevant.
    pub fn retrieve(&self, query: &str) -> Option<String> {
        let ranked = self.rank(query);
        if ranked.is_empty() {
            debug!(query_len = query.len(), "No relevant context");
            return None;
        }

        let selected: Vec<&str> = ranked
            .iter()
            .take(self.top_k)
            .map(|s| s.chunk.content.as_str())
            .collect();

        debug!(
            chunks = selected.len(),
            top = %ranked[0].chunk.id,
            top_score = ranked[0].score,
            "Context retrieved"
        );

        Some(format!("{CONTEXT_HEADER}\n{}", selected.join("\n\n")))
    }
}

impl Default for ContextRetriever {
    fn default() -> Self {
        Self::builtin()
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

fn score(indexed: &IndexedChunk, tokens: &[String]) -> u32 {
    tokens
        .iter()
        .map(|token| {
            let tag_hit = indexed.chunk.tags.iter().any(|t| t == token);
            let content_hit = indexed.content_lower.contains(token.as_str());
            2 * u32::from(tag_hit) + u32::from(content_hit)
        })
        .sum()
}

/// The built-in Systems Thinking knowledge base.
pub fn builtin_corpus() -> Vec<KnowledgeChunk> {
    vec![
        KnowledgeChunk::new(
            "sys-dyn-core",
            ["system", "dynamics", "stocks", "flows", "loops", "feedback"],
            "[System Dynamics Core]\n\
             - Stocks: Accumulations (Memory, Database, Variables).\n\
             - Flows: Changes over time (Functions, API calls, I/O).\n\
             - Feedback Loops: The transmission of information about the stock back to the flow.\n\
             - Balancing Loop (B-Loop): Goal-seeking stability (e.g., Thermostat, Retry Logic).\n\
             - Reinforcing Loop (R-Loop): Compounding growth/decay (e.g., Viral effects, Infinite Recursion).",
        ),
        KnowledgeChunk::new(
            "sys-arch",
            ["archetypes", "meadows", "leverage", "limits"],
            "[System Archetypes & Leverage]\n\
             - Limits to Growth: An R-Loop hits a resource constraint (B-Loop).\n\
             - Shifting the Burden: Solving symptoms instead of root causes.\n\
             - Meadows Leverage Points: Constants (L12) are weak. Structure (L3) and Paradigm (L1) are strong.\n\
             - Delays: The time between action and result. Major source of system oscillation.",
        ),
        KnowledgeChunk::new(
            "py-basics",
            ["python", "variables", "syntax", "loops", "control"],
            "[Python Foundation]\n\
             - Variables are Stocks.\n\
             - Functions are Flows.\n\
             - While/For loops are Control Structures.\n\
             - Recursion is a Reinforcing Loop.\n\
             - 'break' statements act as B-Loop terminators.",
        ),
        KnowledgeChunk::new(
            "prompt-eng",
            ["prompt", "cot", "rag", "few-shot", "chain", "thought"],
            "[Prompt Engineering Strategies]\n\
             - Zero-Shot: Direct instruction.\n\
             - Few-Shot: Providing examples (Analogous to training data).\n\
             - Chain of Thought (CoT): Forcing the model to output reasoning steps (System 2 thinking).\n\
             - RAG: Injecting non-parametric knowledge (Context) into the prompt.",
        ),
        KnowledgeChunk::new(
            "biz-ai",
            ["business", "genai", "divide", "roi", "nanda", "agentic"],
            "[AI in Business 2025]\n\
             - GenAI Divide: 5% success rate requires structural change, not just tools.\n\
             - Shadow AI: Unofficial usage outpaces governance.\n\
             - Agentic Web: Transition from UI-based apps to Intent-based agents.",
        ),
    ]
}
