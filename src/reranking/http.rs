//! HTTP rerank provider speaking the gte-rerank API dialect: the service
//! receives plain document texts and returns (index, relevance_score) rows.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{score_sort, Reranker};
use crate::types::RetrievedItem;

/// Document text sent to the rerank service is capped to keep request sizes
/// bounded; relevance judgment rarely needs more.
const RERANK_DOC_CHARS: usize = 2000;

pub struct HttpReranker {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    output: RerankOutput,
}

#[derive(Debug, Deserialize)]
struct RerankOutput {
    results: Vec<RerankRow>,
}

#[derive(Debug, Deserialize)]
struct RerankRow {
    index: usize,
    relevance_score: f32,
}

impl HttpReranker {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<RetrievedItem>,
        top_n: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedItem>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = documents
            .iter()
            .map(|doc| doc.content.chars().take(RERANK_DOC_CHARS).collect())
            .collect();

        // Over-fetch 2x so the min-score filter still leaves top_n candidates.
        let request = json!({
            "model": self.model,
            "input": {
                "query": query,
                "documents": texts,
            },
            "parameters": {
                "top_n": (top_n * 2).min(texts.len()),
                "return_documents": false,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Rerank request to {} failed: {}", self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(anyhow!(
                "Rerank endpoint {} returned HTTP {}: {}",
                self.endpoint,
                status,
                preview
            ));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse rerank response: {}", e))?;

        let mut usable_rows = 0usize;
        let mut reranked = Vec::new();
        for row in parsed.output.results {
            if let Some(doc) = documents.get(row.index) {
                usable_rows += 1;
                if row.relevance_score >= min_score {
                    let mut doc = doc.clone();
                    doc.score = Some(row.relevance_score);
                    reranked.push(doc);
                }
            }
        }

        // A response with no usable index is malformed upstream output, not a
        // hard failure: fall back to the items' own scores. An all-rows-below-
        // threshold response is a legitimate "nothing relevant" result.
        if usable_rows == 0 {
            tracing::warn!(
                endpoint = %self.endpoint,
                "rerank response contained no usable rows, falling back to score sort"
            );
            return Ok(score_sort(documents, top_n));
        }

        Ok(score_sort(reranked, top_n))
    }
}
