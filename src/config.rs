use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub search: SearchConfig,
    pub chunking: ChunkingConfig,
    pub intake: IntakeConfig,
    pub prompts: PromptConfig,
    /// When false, all fusion paths fall back to score-sort.
    pub rerank_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Desired result count per retrieval; adapters over-fetch 2x of this
    /// to leave headroom for reranking and filtering.
    pub vector_results: usize,
    pub min_relevance_score: f32,
    /// Upper bound on context items forwarded to generation.
    pub max_context_items: usize,
    /// Per-adapter timeout. Expiry is treated exactly like adapter failure:
    /// empty result, trace warning, pipeline continues.
    pub adapter_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Hard cap on URLs fetched per question.
    pub max_urls: usize,
    /// Hours until ephemeral chunks expire.
    pub expire_hours: i64,
    /// Pages shorter than this after boilerplate stripping are skipped.
    pub min_page_chars: usize,
    /// Content cap for the direct-URL-summary branch.
    pub direct_summary_max_chars: usize,
}

/// Prompt templates. Placeholders are substituted verbatim:
/// `{question}`, `{context}`, `{url}`, `{urls}`, `{has_files}`, `{schema}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub precheck: String,
    pub grader: String,
    pub generator_system: String,
    pub generator_user: String,
    pub intent: String,
    pub direct_summary: String,
    pub cypher: String,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.search.vector_results == 0 {
            return Err("search.vector_results must be > 0".into());
        }
        if self.search.max_context_items == 0 {
            return Err("search.max_context_items must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.search.min_relevance_score) {
            return Err("search.min_relevance_score must be in [0.0, 1.0]".into());
        }
        if self.search.adapter_timeout_secs == 0 {
            return Err("search.adapter_timeout_secs must be > 0".into());
        }
        if self.chunking.chunk_size < 50 {
            return Err("chunking.chunk_size must be >= 50".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.intake.max_urls == 0 {
            return Err("intake.max_urls must be > 0".into());
        }
        if self.intake.expire_hours <= 0 {
            return Err("intake.expire_hours must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            chunking: ChunkingConfig::default(),
            intake: IntakeConfig::default(),
            prompts: PromptConfig::default(),
            rerank_enabled: true,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_results: 5,
            min_relevance_score: 0.3,
            max_context_items: 5,
            adapter_timeout_secs: 30,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            min_chunk_size: 50,
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_urls: 5,
            expire_hours: 24,
            min_page_chars: 50,
            direct_summary_max_chars: 8000,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            precheck: "You are a grader assessing whether the retrieved context is \
sufficient to answer a user question.\n\n\
Question: {question}\n\n\
Retrieved Context Snippets (Top results):\n{context}\n\n\
Does this context contain information RELEVANT to the question that could \
potentially form an answer?\n\
Answer YES if it seems relevant.\n\
Answer NO if it seems completely irrelevant or empty.\n\n\
Answer only YES or NO."
                .to_string(),
            grader: "Evaluate if the following context contains ANY information related \
to the question.\n\
Answer 'YES' if the context mentions the topic or contains partial information \
that could help answer the question.\n\
Answer 'NO' only if the context is completely unrelated to the question.\n\n\
Question: {question}\n\n\
Context:\n{context}\n\n\
Your answer (YES or NO):"
                .to_string(),
            generator_system: "You are an expert technical assistant. Answer questions \
based on the provided context. Be accurate and cite sources when possible. If the \
context doesn't contain enough information, say so clearly."
                .to_string(),
            generator_user: "Question: {question}\n\nContext:\n{context}\n\n\
Please provide a comprehensive answer based on the context above. Include relevant \
citations."
                .to_string(),
            intent: "You are an intent classifier. Analyze the user's question and \
determine if they want a DIRECT URL SUMMARY or a SPECIFIC RAG QUERY.\n\n\
User question: {question}\n\
Detected URLs: {urls}\n\
Has uploaded files: {has_files}\n\n\
Classification criteria:\n\
- DIRECT_SUMMARY: User wants to see/summarize/view the URL content without asking \
a specific question\n\
- RAG_QUERY: User has a specific question about the URL content\n\n\
If the user uploaded files, always use RAG_QUERY.\n\n\
Respond with ONLY one word: DIRECT_SUMMARY or RAG_QUERY"
                .to_string(),
            direct_summary: "Please summarize the following web page content in a clear \
and organized manner.\nHighlight the key points, main topics, and any important \
information.\n\nWeb page URL: {url}\n\nContent:\n{content}\n\n\
Provide a comprehensive summary in the same language as the content."
                .to_string(),
            cypher: "Task: Generate a Cypher statement to query a graph database.\n\
Instructions:\n\
Use only the provided node types, relationship types and patterns in the schema.\n\
Do not use any other relationship types or properties that are not provided.\n\n\
Schema:\n{schema}\n\n\
Do not include any explanations or apologies in your response.\n\
Do not respond to any questions that might ask anything else than for you to \
construct a Cypher statement.\n\
Do not include any text except the generated Cypher statement.\n\n\
The question is:\n{question}"
                .to_string(),
        }
    }
}
