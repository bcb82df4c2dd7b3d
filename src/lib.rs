//! Multi-source retrieval-augmented answering over organizational knowledge.
//!
//! A question is routed through up to three retrieval backends (per-org
//! vector search, a text-to-Cypher knowledge graph, and a session-scoped
//! ephemeral store fed by URLs in the question), the results are fused and
//! graded, and an answer is generated from the surviving context.

pub mod config;
pub mod context;
pub mod embeddings;
pub mod errors;
pub mod intake;
pub mod llm;
pub mod pipeline;
pub mod reranking;
pub mod schema;
pub mod storage;
pub mod types;

// Re-export the surface most callers need.
pub use config::RagConfig;
pub use context::ServiceContext;
pub use pipeline::{Pipeline, PipelineStage, RagRequest, RagResponse};
pub use schema::{GraphSchema, SchemaRegistry};
pub use types::{Origin, RetrievalOutcome, RetrievedItem, VizGraph};
