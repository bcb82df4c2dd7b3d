//! URL intake: detect URLs in a message, fetch and chunk their content, and
//! stage the embedded chunks in the session's ephemeral store.

pub mod chunker;
pub mod fetch;
pub mod urls;

pub use chunker::{Chunk, TextChunker};
pub use fetch::{FetchedPage, HttpPageFetcher, PageFetcher};
pub use urls::extract_urls;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::IntakeConfig;
use crate::embeddings::Embedder;
use crate::storage::EphemeralStore;

/// Outcome of ingesting one message's URLs into a session.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub ingested: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub chunks_created: usize,
    /// Characters of page text extracted across the ingested URLs.
    pub total_chars: usize,
}

impl IngestReport {
    pub fn any_ingested(&self) -> bool {
        !self.ingested.is_empty()
    }
}

pub struct UrlIntake {
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn Embedder>,
    store: Arc<EphemeralStore>,
    chunker: TextChunker,
    min_page_chars: usize,
}

impl UrlIntake {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn Embedder>,
        store: Arc<EphemeralStore>,
        chunker: TextChunker,
        config: &IntakeConfig,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            store,
            chunker,
            min_page_chars: config.min_page_chars,
        }
    }

    /// Fetch, chunk, embed, and store each URL for the session. One URL
    /// failing never aborts the others; already-ingested URLs are skipped.
    pub async fn ingest(&self, session_id: &str, urls: &[String]) -> IngestReport {
        let mut report = IngestReport::default();

        for url in urls {
            if self.store.has_url(session_id, url) {
                debug!(%url, session_id, "url already ingested for session, skipping");
                report.skipped.push(url.clone());
                continue;
            }

            match self.ingest_one(session_id, url).await {
                Ok((chunk_count, chars)) => {
                    debug!(%url, session_id, chunk_count, chars, "ingested url into session store");
                    report.ingested.push(url.clone());
                    report.chunks_created += chunk_count;
                    report.total_chars += chars;
                }
                Err(e) => {
                    warn!(%url, session_id, error = %e, "failed to ingest url");
                    report.failed.push((url.clone(), e.to_string()));
                }
            }
        }

        report
    }

    async fn ingest_one(&self, session_id: &str, url: &str) -> Result<(usize, usize)> {
        let page = self.fetcher.fetch(url).await?;
        if page.text.len() < self.min_page_chars {
            anyhow::bail!(
                "page at {} yielded only {} characters of text",
                url,
                page.text.len()
            );
        }

        let chunks = self.chunker.chunk(&page.text);
        if chunks.is_empty() {
            anyhow::bail!("page at {} produced no usable chunks", url);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            );
        }

        let count = texts.len();
        self.store.add_chunks(
            session_id,
            url,
            texts.into_iter().zip(embeddings).collect(),
        );
        Ok((count, page.text.chars().count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeFetcher {
        text: String,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            if self.fail_on.as_deref() == Some(url) {
                anyhow::bail!("connection refused");
            }
            Ok(FetchedPage {
                url: url.to_string(),
                title: None,
                text: self.text.clone(),
            })
        }
    }

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn intake(store: Arc<EphemeralStore>, fetcher: FakeFetcher) -> UrlIntake {
        UrlIntake::new(
            Arc::new(fetcher),
            Arc::new(FakeEmbedder),
            store,
            TextChunker::new(500, 100, 50),
            &IntakeConfig::default(),
        )
    }

    #[tokio::test]
    async fn ingests_page_into_session_store() {
        let store = Arc::new(EphemeralStore::new(24));
        let intake = intake(
            store.clone(),
            FakeFetcher {
                text: "useful page content ".repeat(20),
                fail_on: None,
            },
        );

        let report = intake
            .ingest("s1", &["https://example.com".to_string()])
            .await;
        assert_eq!(report.ingested, vec!["https://example.com"]);
        assert!(store.has_data("s1"));
    }

    #[tokio::test]
    async fn reports_chunk_and_character_counts() {
        let store = Arc::new(EphemeralStore::new(24));
        let page = "useful page content ".repeat(20);
        let intake = intake(
            store,
            FakeFetcher {
                text: page.clone(),
                fail_on: None,
            },
        );

        let report = intake
            .ingest("s1", &["https://example.com".to_string()])
            .await;
        assert_eq!(report.chunks_created, 1);
        assert_eq!(report.total_chars, page.chars().count());
    }

    #[tokio::test]
    async fn skips_already_ingested_urls() {
        let store = Arc::new(EphemeralStore::new(24));
        let intake = intake(
            store.clone(),
            FakeFetcher {
                text: "useful page content ".repeat(20),
                fail_on: None,
            },
        );

        let urls = vec!["https://example.com".to_string()];
        intake.ingest("s1", &urls).await;
        let second = intake.ingest("s1", &urls).await;
        assert!(second.ingested.is_empty());
        assert_eq!(second.skipped, urls);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let store = Arc::new(EphemeralStore::new(24));
        let intake = intake(
            store.clone(),
            FakeFetcher {
                text: "useful page content ".repeat(20),
                fail_on: Some("https://bad.com".to_string()),
            },
        );

        let report = intake
            .ingest(
                "s1",
                &[
                    "https://bad.com".to_string(),
                    "https://good.com".to_string(),
                ],
            )
            .await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.ingested, vec!["https://good.com"]);
    }

    #[tokio::test]
    async fn too_little_text_is_a_failure() {
        let store = Arc::new(EphemeralStore::new(24));
        let intake = intake(
            store.clone(),
            FakeFetcher {
                text: "tiny".to_string(),
                fail_on: None,
            },
        );

        let report = intake
            .ingest("s1", &["https://example.com".to_string()])
            .await;
        assert_eq!(report.failed.len(), 1);
        assert!(!store.has_data("s1"));
    }
}
