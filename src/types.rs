use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Which retrieval backend produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Vector,
    Graph,
    Ephemeral,
    UrlDirect,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Ephemeral => "ephemeral",
            Self::UrlDirect => "url_direct",
        }
    }
}

/// A single retrieved context item, uniform across all backends.
///
/// Immutable after creation except for the origin stamp and the rerank
/// score applied during fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub content: String,
    pub origin: Origin,
    /// Relevance in [0, 1]. `None` means the backend produced no score.
    pub score: Option<f32>,
    /// Source locator: file path, URL, or a query descriptor.
    pub source: String,
    pub metadata: HashMap<String, String>,
}

impl RetrievedItem {
    pub fn new(content: impl Into<String>, origin: Origin, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin,
            score: None,
            source: source.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn score_or_zero(&self) -> f32 {
        self.score.unwrap_or(0.0)
    }
}

/// Explicit adapter status. Adapters never raise past their boundary;
/// the orchestrator branches on this instead of catching errors.
#[derive(Debug, Clone)]
pub enum RetrievalOutcome {
    Hit(Vec<RetrievedItem>),
    Empty,
    /// Backend down or misconfigured. Carries a short human-readable reason
    /// for the trace; the pipeline continues with whatever else it has.
    Unavailable(String),
}

impl RetrievalOutcome {
    pub fn into_items(self) -> Vec<RetrievedItem> {
        match self {
            Self::Hit(items) => items,
            Self::Empty | Self::Unavailable(_) => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Hit(items) => items.is_empty(),
            Self::Empty | Self::Unavailable(_) => true,
        }
    }
}

/// Graph visualization payload for the caller's UI, separate from the
/// textual context items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VizGraph {
    pub nodes: Vec<VizNode>,
    pub links: Vec<VizLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VizLink {
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Number of leading characters that participate in the dedup key.
pub const DEDUP_PREFIX_CHARS: usize = 200;

/// Deduplication key for fused context: a hash of the first 200 characters
/// of content. Collisions are treated as duplicates; this is a stability
/// key, not a cryptographic one.
pub fn content_prefix_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    for c in content.chars().take(DEDUP_PREFIX_CHARS) {
        c.hash(&mut hasher);
    }
    hasher.finish()
}
