//! Context fusion: merge the adapters' results into one ranked list.
//!
//! Concatenation order is fixed (vector, then graph, then ephemeral) so
//! deduplication keeps the same winner on every run. Reranking failures
//! degrade to a score sort rather than failing the pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::config::SearchConfig;
use crate::reranking::{score_sort, Reranker};
use crate::types::{content_prefix_hash, RetrievedItem};

pub async fn fuse(
    question: &str,
    vector: Vec<RetrievedItem>,
    graph: Vec<RetrievedItem>,
    ephemeral: Vec<RetrievedItem>,
    reranker: Option<&Arc<dyn Reranker>>,
    search: &SearchConfig,
) -> Vec<RetrievedItem> {
    let mut combined = Vec::with_capacity(vector.len() + graph.len() + ephemeral.len());
    combined.extend(vector);
    combined.extend(graph);
    combined.extend(ephemeral);

    let deduped = dedup_by_content(combined);

    // Nothing to rank, or nothing to rank against.
    if deduped.len() <= 1 {
        return deduped;
    }

    if let Some(reranker) = reranker {
        match reranker
            .rerank(
                question,
                deduped.clone(),
                search.max_context_items,
                search.min_relevance_score,
            )
            .await
        {
            Ok(reranked) => return reranked,
            Err(e) => {
                warn!(error = %e, "rerank failed, falling back to score sort");
            }
        }
    }

    score_sort(deduped, search.max_context_items)
}

/// Drop items whose content prefix was already seen, keeping first
/// occurrence. Order is otherwise preserved.
fn dedup_by_content(items: Vec<RetrievedItem>) -> Vec<RetrievedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(content_prefix_hash(&item.content)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;
    use anyhow::Result;
    use async_trait::async_trait;

    fn item(content: &str, origin: Origin, score: f32) -> RetrievedItem {
        RetrievedItem::new(content, origin, "test").with_score(score)
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _documents: Vec<RetrievedItem>,
            _top_n: usize,
            _min_score: f32,
        ) -> Result<Vec<RetrievedItem>> {
            anyhow::bail!("rerank service down")
        }
    }

    struct ReversingReranker;

    #[async_trait]
    impl Reranker for ReversingReranker {
        async fn rerank(
            &self,
            _query: &str,
            mut documents: Vec<RetrievedItem>,
            top_n: usize,
            _min_score: f32,
        ) -> Result<Vec<RetrievedItem>> {
            documents.reverse();
            documents.truncate(top_n);
            Ok(documents)
        }
    }

    #[tokio::test]
    async fn empty_inputs_fuse_to_empty() {
        let fused = fuse(
            "q",
            Vec::new(),
            Vec::new(),
            Vec::new(),
            None,
            &SearchConfig::default(),
        )
        .await;
        assert!(fused.is_empty());
    }

    #[tokio::test]
    async fn single_item_short_circuits_reranking() {
        let reranker: Arc<dyn Reranker> = Arc::new(FailingReranker);
        let fused = fuse(
            "q",
            vec![item("only one", Origin::Vector, 0.5)],
            Vec::new(),
            Vec::new(),
            Some(&reranker),
            &SearchConfig::default(),
        )
        .await;
        // The failing reranker was never called.
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].content, "only one");
    }

    #[tokio::test]
    async fn dedup_keeps_earlier_origin() {
        let fused = fuse(
            "q",
            vec![item("same content", Origin::Vector, 0.4)],
            vec![item("same content", Origin::Graph, 0.8)],
            Vec::new(),
            None,
            &SearchConfig::default(),
        )
        .await;
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].origin, Origin::Vector);
    }

    #[tokio::test]
    async fn rerank_failure_degrades_to_score_sort() {
        let reranker: Arc<dyn Reranker> = Arc::new(FailingReranker);
        let fused = fuse(
            "q",
            vec![item("low", Origin::Vector, 0.2)],
            vec![item("high", Origin::Graph, 0.9)],
            Vec::new(),
            Some(&reranker),
            &SearchConfig::default(),
        )
        .await;
        assert_eq!(fused[0].content, "high");
        assert_eq!(fused[1].content, "low");
    }

    #[tokio::test]
    async fn reranker_output_is_respected() {
        let reranker: Arc<dyn Reranker> = Arc::new(ReversingReranker);
        let fused = fuse(
            "q",
            vec![item("first", Origin::Vector, 0.9)],
            vec![item("second", Origin::Graph, 0.1)],
            Vec::new(),
            Some(&reranker),
            &SearchConfig::default(),
        )
        .await;
        assert_eq!(fused[0].content, "second");
    }

    #[tokio::test]
    async fn fusion_is_idempotent() {
        let search = SearchConfig::default();
        let once = fuse(
            "q",
            vec![
                item("alpha", Origin::Vector, 0.7),
                item("beta", Origin::Vector, 0.5),
            ],
            vec![item("alpha", Origin::Graph, 0.8)],
            Vec::new(),
            None,
            &search,
        )
        .await;
        let twice = fuse("q", once.clone(), Vec::new(), Vec::new(), None, &search).await;
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert_eq!(a.content, b.content);
        }
    }

    #[tokio::test]
    async fn truncates_to_max_context_items() {
        let search = SearchConfig {
            max_context_items: 2,
            ..SearchConfig::default()
        };
        let fused = fuse(
            "q",
            vec![
                item("a", Origin::Vector, 0.9),
                item("b", Origin::Vector, 0.8),
                item("c", Origin::Vector, 0.7),
            ],
            Vec::new(),
            Vec::new(),
            None,
            &search,
        )
        .await;
        assert_eq!(fused.len(), 2);
    }
}
