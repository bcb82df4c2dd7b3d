//! Cross-source reranking capability.
//!
//! May be globally disabled by configuration (the `ServiceContext` then
//! carries no reranker), in which case fusion falls back to sorting items by
//! their pre-existing scores.

pub mod http;

pub use http::HttpReranker;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::RetrievedItem;

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Re-score `documents` against `query`, returning at most `top_n` items
    /// with a relevance score of at least `min_score`, best first.
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<RetrievedItem>,
        top_n: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedItem>>;
}

/// Fallback ordering used whenever reranking is disabled or fails: sort by
/// each item's pre-existing score descending and truncate to `top_n`.
pub fn score_sort(mut items: Vec<RetrievedItem>, top_n: usize) -> Vec<RetrievedItem> {
    items.sort_by(|a, b| {
        b.score_or_zero()
            .partial_cmp(&a.score_or_zero())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items.truncate(top_n);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;

    fn item(content: &str, score: Option<f32>) -> RetrievedItem {
        let mut item = RetrievedItem::new(content, Origin::Vector, "test");
        item.score = score;
        item
    }

    #[test]
    fn score_sort_orders_descending_and_truncates() {
        let items = vec![
            item("low", Some(0.2)),
            item("high", Some(0.9)),
            item("mid", Some(0.5)),
        ];
        let sorted = score_sort(items, 2);
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].content, "high");
        assert_eq!(sorted[1].content, "mid");
    }

    #[test]
    fn unscored_items_sort_last() {
        let items = vec![item("unscored", None), item("scored", Some(0.1))];
        let sorted = score_sort(items, 10);
        assert_eq!(sorted[0].content, "scored");
    }
}
