//! URL intent classification and the direct-summary bypass branch.

use anyhow::Result;
use tracing::warn;

use crate::context::ServiceContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlIntent {
    /// The user wants the page summarized as-is; skip retrieval entirely.
    DirectSummary,
    /// The user has a question about the page; ingest it and run the
    /// full pipeline.
    RagQuery,
}

/// Decide whether a question with URLs wants a direct summary or a RAG run.
///
/// Uploaded files always force `RagQuery`, and so does any classifier
/// failure: a wrong summary loses the user's question, a wrong RAG run
/// merely costs retrieval work.
pub async fn classify(
    ctx: &ServiceContext,
    question: &str,
    urls: &[String],
    has_files: bool,
) -> UrlIntent {
    if has_files {
        return UrlIntent::RagQuery;
    }

    let prompt = ctx
        .config
        .prompts
        .intent
        .replace("{question}", question)
        .replace("{urls}", &urls.join(", "))
        .replace("{has_files}", if has_files { "yes" } else { "no" });

    match ctx.llm.invoke(&prompt).await {
        Ok(response) => {
            if response.trim().to_uppercase().contains("DIRECT_SUMMARY") {
                UrlIntent::DirectSummary
            } else {
                UrlIntent::RagQuery
            }
        }
        Err(e) => {
            warn!(error = %e, "intent classification failed, defaulting to rag query");
            UrlIntent::RagQuery
        }
    }
}

/// Fetch the page and summarize it in one LLM call. Content is capped before
/// prompting so an arbitrarily large page cannot blow the context window.
pub async fn direct_summary(ctx: &ServiceContext, url: &str) -> Result<String> {
    let page = ctx.fetcher.fetch(url).await?;
    if page.text.len() < ctx.config.intake.min_page_chars {
        anyhow::bail!("page at {} has too little text to summarize", url);
    }

    let content: String = page
        .text
        .chars()
        .take(ctx.config.intake.direct_summary_max_chars)
        .collect();
    let prompt = ctx
        .config
        .prompts
        .direct_summary
        .replace("{url}", url)
        .replace("{content}", &content);

    ctx.llm.invoke(&prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::embeddings::Embedder;
    use crate::intake::{FetchedPage, PageFetcher};
    use crate::llm::{ChatMessage, LlmClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedLlm {
        response: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn invoke(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Some(r) => Ok(r.clone()),
                None => anyhow::bail!("llm unreachable"),
            }
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

    struct FixedFetcher {
        text: String,
    }

    #[async_trait]
    impl PageFetcher for FixedFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            Ok(FetchedPage {
                url: url.to_string(),
                title: None,
                text: self.text.clone(),
            })
        }
    }

    fn ctx(response: Option<&str>, page_text: &str) -> (ServiceContext, Arc<ScriptedLlm>) {
        let llm = Arc::new(ScriptedLlm {
            response: response.map(String::from),
            calls: AtomicUsize::new(0),
        });
        let ctx = ServiceContext::builder()
            .config(RagConfig::default())
            .llm(llm.clone())
            .embedder(Arc::new(NullEmbedder))
            .fetcher(Arc::new(FixedFetcher {
                text: page_text.to_string(),
            }))
            .build()
            .unwrap();
        (ctx, llm)
    }

    #[tokio::test]
    async fn files_force_rag_query_without_llm_call() {
        let (ctx, llm) = ctx(Some("DIRECT_SUMMARY"), "");
        let intent = classify(&ctx, "q", &["https://a.com".to_string()], true).await;
        assert_eq!(intent, UrlIntent::RagQuery);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn classifier_answer_is_respected() {
        let (ctx, _) = ctx(Some("DIRECT_SUMMARY"), "");
        let intent = classify(&ctx, "q", &["https://a.com".to_string()], false).await;
        assert_eq!(intent, UrlIntent::DirectSummary);
    }

    #[tokio::test]
    async fn classifier_failure_defaults_to_rag_query() {
        let (ctx, _) = ctx(None, "");
        let intent = classify(&ctx, "q", &["https://a.com".to_string()], false).await;
        assert_eq!(intent, UrlIntent::RagQuery);
    }

    #[tokio::test]
    async fn direct_summary_rejects_near_empty_pages() {
        let (ctx, _) = ctx(Some("summary"), "tiny");
        assert!(direct_summary(&ctx, "https://a.com").await.is_err());
    }

    #[tokio::test]
    async fn direct_summary_returns_llm_output() {
        let page = "long page content ".repeat(20);
        let (ctx, _) = ctx(Some("the summary"), &page);
        let summary = direct_summary(&ctx, "https://a.com").await.unwrap();
        assert_eq!(summary, "the summary");
    }
}
