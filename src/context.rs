//! Shared service handles injected into the pipeline.
//!
//! Every backend is reached through a trait object owned here, so tests swap
//! in fakes and the orchestrator never touches a global.

use std::sync::Arc;

use crate::config::RagConfig;
use crate::embeddings::Embedder;
use crate::intake::PageFetcher;
use crate::llm::LlmClient;
use crate::reranking::Reranker;
use crate::schema::SchemaRegistry;
use crate::storage::{EphemeralStore, GraphStore, VectorStore};

#[derive(Clone)]
pub struct ServiceContext {
    pub config: Arc<RagConfig>,
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn Embedder>,
    /// Absent when the deployment has no vector backend configured; the
    /// vector adapter then reports itself unavailable.
    pub vector_store: Option<Arc<dyn VectorStore>>,
    /// Absent when no graph backend is configured.
    pub graph_store: Option<Arc<dyn GraphStore>>,
    pub ephemeral: Arc<EphemeralStore>,
    /// Absent when reranking is disabled; fusion falls back to score sort.
    pub reranker: Option<Arc<dyn Reranker>>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub schemas: Arc<SchemaRegistry>,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::default()
    }
}

#[derive(Default)]
pub struct ServiceContextBuilder {
    config: Option<RagConfig>,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn Embedder>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    graph_store: Option<Arc<dyn GraphStore>>,
    ephemeral: Option<Arc<EphemeralStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    fetcher: Option<Arc<dyn PageFetcher>>,
    schemas: Option<Arc<SchemaRegistry>>,
}

impl ServiceContextBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn graph_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.graph_store = Some(store);
        self
    }

    pub fn ephemeral(mut self, store: Arc<EphemeralStore>) -> Self {
        self.ephemeral = Some(store);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    pub fn build(self) -> anyhow::Result<ServiceContext> {
        let config = self.config.unwrap_or_default();
        let llm = self.llm.ok_or_else(|| anyhow::anyhow!("llm is required"))?;
        let embedder = self
            .embedder
            .ok_or_else(|| anyhow::anyhow!("embedder is required"))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| anyhow::anyhow!("fetcher is required"))?;
        let ephemeral = self
            .ephemeral
            .unwrap_or_else(|| Arc::new(EphemeralStore::new(config.intake.expire_hours)));

        // Reranker only matters when the config enables reranking.
        let reranker = if config.rerank_enabled {
            self.reranker
        } else {
            None
        };

        Ok(ServiceContext {
            config: Arc::new(config),
            llm,
            embedder,
            vector_store: self.vector_store,
            graph_store: self.graph_store,
            ephemeral,
            reranker,
            fetcher,
            schemas: self.schemas.unwrap_or_default(),
        })
    }
}
