//! Vector retrieval adapter.
//!
//! Fans out one query per in-scope organization and merges the results by
//! similarity. A failing org is recorded and skipped; partial results are
//! acceptable and total failure across all orgs is an empty list, not an
//! error.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::errors::StoreError;
use crate::types::{Origin, RetrievalOutcome, RetrievedItem};

pub struct VectorRetrieval {
    pub outcome: RetrievalOutcome,
    /// Per-org failure messages, surfaced in the response trace.
    pub warnings: Vec<String>,
}

impl VectorRetrieval {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            outcome: RetrievalOutcome::Unavailable(reason.into()),
            warnings: Vec::new(),
        }
    }

    fn of(outcome: RetrievalOutcome) -> Self {
        Self {
            outcome,
            warnings: Vec::new(),
        }
    }
}

pub async fn retrieve(
    ctx: &ServiceContext,
    embedding: &[f32],
    org_ids: &[String],
    file_filter: Option<&[String]>,
) -> VectorRetrieval {
    let Some(store) = &ctx.vector_store else {
        return VectorRetrieval::unavailable("no vector store configured");
    };
    if org_ids.is_empty() {
        return VectorRetrieval::of(RetrievalOutcome::Empty);
    }

    // Over-fetch so downstream filtering and reranking have headroom.
    let n_results = ctx.config.search.vector_results * 2;

    let queries = org_ids
        .iter()
        .map(|org_id| async move {
            let result = store.query(org_id, embedding, file_filter, n_results).await;
            (org_id, result)
        })
        .collect::<Vec<_>>();

    let mut items = Vec::new();
    let mut warnings = Vec::new();
    for (org_id, result) in join_all(queries).await {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // An org without a collection simply has no documents yet.
                if e.downcast_ref::<StoreError>()
                    .is_some_and(|s| matches!(s, StoreError::MissingCollection(_)))
                {
                    debug!(org_id, "no vector collection for org, skipping");
                } else {
                    warn!(org_id, error = %e, "vector query failed, continuing without this org");
                    warnings.push(format!("vector search failed for org {}: {}", org_id, e));
                }
                continue;
            }
        };

        for (i, document) in result.documents.into_iter().enumerate() {
            if document.is_empty() {
                continue;
            }
            let metadata = result.metadatas.get(i).cloned().unwrap_or_default();
            let source = metadata
                .get("filename")
                .or_else(|| metadata.get("source"))
                .cloned()
                .unwrap_or_else(|| format!("org_{}", org_id));
            let score = result
                .distances
                .get(i)
                .map(|d| (1.0 - d).clamp(0.0, 1.0))
                .unwrap_or(0.0);

            let mut item = RetrievedItem::new(document, Origin::Vector, source).with_score(score);
            item.metadata = metadata;
            items.push(item);
        }
    }

    if items.is_empty() {
        return VectorRetrieval {
            outcome: RetrievalOutcome::Empty,
            warnings,
        };
    }

    // Merge across orgs by similarity.
    items.sort_by(|a, b| {
        b.score_or_zero()
            .partial_cmp(&a.score_or_zero())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    VectorRetrieval {
        outcome: RetrievalOutcome::Hit(items),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::embeddings::Embedder;
    use crate::intake::{FetchedPage, PageFetcher};
    use crate::llm::{ChatMessage, LlmClient};
    use crate::storage::vector::{VectorQueryResult, VectorStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NullLlm;

    #[async_trait]
    impl LlmClient for NullLlm {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("not used")
        }
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String> {
            anyhow::bail!("not used")
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl Embedder for NullEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    struct NullFetcher;

    #[async_trait]
    impl PageFetcher for NullFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
            anyhow::bail!("not used")
        }
    }

    /// Per-org scripted store: org id -> (distance, document) rows, a missing
    /// org id behaves as a down backend.
    struct FakeVectorStore {
        orgs: HashMap<String, Vec<(f32, String)>>,
        missing_collections: Vec<String>,
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn query(
            &self,
            org_id: &str,
            _embedding: &[f32],
            _file_filter: Option<&[String]>,
            _n_results: usize,
        ) -> Result<VectorQueryResult> {
            if self.missing_collections.iter().any(|o| o == org_id) {
                return Err(StoreError::MissingCollection(format!("org_{}", org_id)).into());
            }
            let Some(rows) = self.orgs.get(org_id) else {
                return Err(StoreError::unavailable("connection refused").into());
            };
            Ok(VectorQueryResult {
                documents: rows.iter().map(|(_, d)| d.clone()).collect(),
                metadatas: rows
                    .iter()
                    .map(|_| HashMap::from([("filename".to_string(), "doc.md".to_string())]))
                    .collect(),
                distances: rows.iter().map(|(d, _)| *d).collect(),
            })
        }

        async fn add(
            &self,
            _org_id: &str,
            _ids: Vec<String>,
            _embeddings: Vec<Vec<f32>>,
            _documents: Vec<String>,
            _metadatas: Vec<HashMap<String, String>>,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _org_id: &str, _ids: Vec<String>) -> Result<()> {
            Ok(())
        }
    }

    fn ctx_with(store: FakeVectorStore) -> ServiceContext {
        ServiceContext::builder()
            .config(RagConfig::default())
            .llm(Arc::new(NullLlm))
            .embedder(Arc::new(NullEmbedder))
            .fetcher(Arc::new(NullFetcher))
            .vector_store(Arc::new(store))
            .build()
            .unwrap()
    }

    fn orgs(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn converts_distance_to_similarity() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::from([("org1".to_string(), vec![(0.25, "found".to_string())])]),
            missing_collections: Vec::new(),
        });
        let items = retrieve(&ctx, &[1.0], &orgs(&["org1"]), None)
            .await
            .outcome
            .into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].origin, Origin::Vector);
        assert_eq!(items[0].source, "doc.md");
        assert!((items[0].score_or_zero() - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn merges_orgs_by_descending_score() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::from([
                ("org1".to_string(), vec![(0.6, "weak match".to_string())]),
                ("org2".to_string(), vec![(0.1, "strong match".to_string())]),
            ]),
            missing_collections: Vec::new(),
        });
        let items = retrieve(&ctx, &[1.0], &orgs(&["org1", "org2"]), None)
            .await
            .outcome
            .into_items();
        assert_eq!(items[0].content, "strong match");
        assert_eq!(items[1].content, "weak match");
    }

    #[tokio::test]
    async fn failing_org_is_skipped_not_fatal() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::from([("org2".to_string(), vec![(0.2, "survivor".to_string())])]),
            missing_collections: Vec::new(),
        });
        let retrieval = retrieve(&ctx, &[1.0], &orgs(&["org1", "org2"]), None).await;
        let items = retrieval.outcome.into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "survivor");
        assert_eq!(retrieval.warnings.len(), 1);
        assert!(retrieval.warnings[0].contains("org1"));
    }

    #[tokio::test]
    async fn total_failure_across_orgs_is_empty() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::new(),
            missing_collections: Vec::new(),
        });
        let retrieval = retrieve(&ctx, &[1.0], &orgs(&["org1", "org2"]), None).await;
        assert!(matches!(retrieval.outcome, RetrievalOutcome::Empty));
        // Each failed org leaves a trace warning.
        assert_eq!(retrieval.warnings.len(), 2);
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::new(),
            missing_collections: vec!["org1".to_string()],
        });
        let retrieval = retrieve(&ctx, &[1.0], &orgs(&["org1"]), None).await;
        assert!(matches!(retrieval.outcome, RetrievalOutcome::Empty));
        assert!(retrieval.warnings.is_empty());
    }

    #[tokio::test]
    async fn no_store_configured_is_unavailable() {
        let ctx = ServiceContext::builder()
            .config(RagConfig::default())
            .llm(Arc::new(NullLlm))
            .embedder(Arc::new(NullEmbedder))
            .fetcher(Arc::new(NullFetcher))
            .build()
            .unwrap();
        let retrieval = retrieve(&ctx, &[1.0], &orgs(&["org1"]), None).await;
        assert!(matches!(retrieval.outcome, RetrievalOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_documents_are_dropped() {
        let ctx = ctx_with(FakeVectorStore {
            orgs: HashMap::from([(
                "org1".to_string(),
                vec![(0.1, String::new()), (0.2, "real".to_string())],
            )]),
            missing_collections: Vec::new(),
        });
        let items = retrieve(&ctx, &[1.0], &orgs(&["org1"]), None)
            .await
            .outcome
            .into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "real");
    }
}
