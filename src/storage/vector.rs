//! Vector store adapter. Collections are partitioned per organization for
//! isolation; the pipeline only ever queries collections belonging to the
//! requesting org scope.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::StoreError;

/// Raw per-collection query result, parallel arrays in result order.
#[derive(Debug, Clone, Default)]
pub struct VectorQueryResult {
    pub documents: Vec<String>,
    pub metadatas: Vec<HashMap<String, String>>,
    /// Distances as reported by the store; smaller is closer. Converted to
    /// similarity scores by the retrieval adapter.
    pub distances: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Query one organization's collection. `file_filter` restricts results
    /// to the given document ids when the caller has pinned files.
    async fn query(
        &self,
        org_id: &str,
        embedding: &[f32],
        file_filter: Option<&[String]>,
        n_results: usize,
    ) -> Result<VectorQueryResult>;

    async fn add(
        &self,
        org_id: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<HashMap<String, String>>,
    ) -> Result<()>;

    async fn delete(&self, org_id: &str, ids: Vec<String>) -> Result<()>;
}

/// REST client for a Chroma-style vector store: one named collection per
/// organization, query-by-embedding with an optional metadata filter.
pub struct HttpVectorStore {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RawQueryResponse {
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<HashMap<String, serde_json::Value>>>,
    #[serde(default)]
    distances: Vec<Vec<f32>>,
}

impl HttpVectorStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn collection_name(org_id: &str) -> String {
        format!("org_{}", org_id)
    }

    fn collection_url(&self, org_id: &str, op: &str) -> String {
        format!(
            "{}/collections/{}/{}",
            self.base_url,
            Self::collection_name(org_id),
            op
        )
    }

    fn flatten_metadata(raw: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
        raw.into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for HttpVectorStore {
    async fn query(
        &self,
        org_id: &str,
        embedding: &[f32],
        file_filter: Option<&[String]>,
        n_results: usize,
    ) -> Result<VectorQueryResult> {
        let url = self.collection_url(org_id, "query");

        let mut request = json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(file_ids) = file_filter {
            request["where"] = json!({ "doc_id": { "$in": file_ids } });
        }

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("vector store at {}: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::MissingCollection(Self::collection_name(org_id)).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(StoreError::unavailable(format!(
                "vector store returned HTTP {}: {}",
                status, preview
            ))
            .into());
        }

        let raw: RawQueryResponse = response.json().await.map_err(|e| StoreError::Malformed {
            endpoint: url.clone(),
            detail: e.to_string(),
        })?;

        // The store nests results per query embedding; we always send one.
        let documents = raw.documents.into_iter().next().unwrap_or_default();
        let metadatas = raw
            .metadatas
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(Self::flatten_metadata)
            .collect();
        let distances = raw.distances.into_iter().next().unwrap_or_default();

        Ok(VectorQueryResult {
            documents,
            metadatas,
            distances,
        })
    }

    async fn add(
        &self,
        org_id: &str,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        documents: Vec<String>,
        metadatas: Vec<HashMap<String, String>>,
    ) -> Result<()> {
        let url = self.collection_url(org_id, "add");
        let request = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("vector store at {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(StoreError::unavailable(format!(
                "vector store add returned HTTP {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }

    async fn delete(&self, org_id: &str, ids: Vec<String>) -> Result<()> {
        let url = self.collection_url(org_id, "delete");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| StoreError::unavailable(format!("vector store at {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(StoreError::unavailable(format!(
                "vector store delete returned HTTP {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }
}
