//! Relevance grading at the pipeline's two decision points.
//!
//! The two checks fail in opposite directions on purpose. The precheck runs
//! while graph escalation is still possible, so an error grades insufficient
//! and more evidence gets gathered. The final grade runs when generation is
//! the only step left, so an error lets generation proceed rather than
//! discarding context that was already vetted once.

use tracing::warn;

use crate::context::ServiceContext;
use crate::types::RetrievedItem;

/// Precheck sampling: cheap snippets, not full documents.
const PRECHECK_VECTOR_SNIPPETS: usize = 3;
const PRECHECK_EPHEMERAL_SNIPPETS: usize = 2;
const PRECHECK_SNIPPET_CHARS: usize = 300;

/// Final grade sees full content, bounded by item count.
const FINAL_GRADE_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Relevant,
    Insufficient,
}

/// Cheap sufficiency check on the primary (vector + ephemeral) results.
///
/// Empty input short-circuits to `Insufficient` without an LLM call, and so
/// does an LLM error: both route the pipeline to secondary retrieval.
pub async fn precheck(
    ctx: &ServiceContext,
    question: &str,
    vector_items: &[RetrievedItem],
    ephemeral_items: &[RetrievedItem],
) -> Grade {
    if vector_items.is_empty() && ephemeral_items.is_empty() {
        return Grade::Insufficient;
    }

    let snippets: Vec<String> = vector_items
        .iter()
        .take(PRECHECK_VECTOR_SNIPPETS)
        .chain(ephemeral_items.iter().take(PRECHECK_EPHEMERAL_SNIPPETS))
        .enumerate()
        .map(|(i, item)| {
            let snippet: String = item.content.chars().take(PRECHECK_SNIPPET_CHARS).collect();
            format!("[{}] {}", i + 1, snippet)
        })
        .collect();

    let prompt = ctx
        .config
        .prompts
        .precheck
        .replace("{question}", question)
        .replace("{context}", &snippets.join("\n"));

    match ctx.llm.invoke(&prompt).await {
        Ok(response) => parse_yes_no(&response, Grade::Insufficient),
        Err(e) => {
            warn!(error = %e, "precheck grading failed, escalating to secondary retrieval");
            Grade::Insufficient
        }
    }
}

/// Final relevance grade on the fused context.
///
/// Empty input short-circuits to `Insufficient` without an LLM call; an LLM
/// error grades `Relevant` so an answer is still attempted.
pub async fn final_grade(ctx: &ServiceContext, question: &str, items: &[RetrievedItem]) -> Grade {
    if items.is_empty() {
        return Grade::Insufficient;
    }

    let context = items
        .iter()
        .take(FINAL_GRADE_ITEMS)
        .enumerate()
        .map(|(i, item)| format!("[{}] {}", i + 1, item.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = ctx
        .config
        .prompts
        .grader
        .replace("{question}", question)
        .replace("{context}", &context);

    match ctx.llm.invoke(&prompt).await {
        Ok(response) => parse_yes_no(&response, Grade::Insufficient),
        Err(e) => {
            warn!(error = %e, "final grading failed, attempting answer anyway");
            Grade::Relevant
        }
    }
}

fn parse_yes_no(response: &str, on_ambiguous: Grade) -> Grade {
    let upper = response.trim().to_uppercase();
    if upper.contains("YES") {
        Grade::Relevant
    } else if upper.contains("NO") {
        Grade::Insufficient
    } else {
        on_ambiguous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::embeddings::Embedder;
    use crate::intake::{FetchedPage, PageFetcher};
    use crate::llm::{ChatMessage, LlmClient};
    use crate::types::Origin;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedLlm {
        response: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn answering(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Some(response.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: None,
                calls: AtomicUsize::new(0),
            })
        }
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

    struct NullFetcher;

    #[async_trait]
    impl PageFetcher for NullFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage> {
            anyhow::bail!("not used")
        }
    }

    fn ctx(llm: Arc<ScriptedLlm>) -> ServiceContext {
        ServiceContext::builder()
            .config(RagConfig::default())
            .llm(llm)
            .embedder(Arc::new(NullEmbedder))
            .fetcher(Arc::new(NullFetcher))
            .build()
            .unwrap()
    }

    fn items(origin: Origin, n: usize) -> Vec<RetrievedItem> {
        (0..n)
            .map(|i| RetrievedItem::new(format!("chunk {}", i), origin, "src").with_score(0.7))
            .collect()
    }

    #[tokio::test]
    async fn precheck_empty_input_skips_the_llm() {
        let llm = ScriptedLlm::answering("YES");
        let grade = precheck(&ctx(llm.clone()), "q", &[], &[]).await;
        assert_eq!(grade, Grade::Insufficient);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn final_grade_empty_input_skips_the_llm() {
        let llm = ScriptedLlm::answering("YES");
        let grade = final_grade(&ctx(llm.clone()), "q", &[]).await;
        assert_eq!(grade, Grade::Insufficient);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn precheck_error_escalates() {
        let grade = precheck(
            &ctx(ScriptedLlm::failing()),
            "q",
            &items(Origin::Vector, 1),
            &[],
        )
        .await;
        assert_eq!(grade, Grade::Insufficient);
    }

    #[tokio::test]
    async fn final_grade_error_attempts_answer() {
        let grade = final_grade(&ctx(ScriptedLlm::failing()), "q", &items(Origin::Vector, 1)).await;
        assert_eq!(grade, Grade::Relevant);
    }

    #[tokio::test]
    async fn yes_means_relevant() {
        let grade = final_grade(
            &ctx(ScriptedLlm::answering("yes")),
            "q",
            &items(Origin::Vector, 1),
        )
        .await;
        assert_eq!(grade, Grade::Relevant);
    }

    #[tokio::test]
    async fn no_means_insufficient() {
        let grade = final_grade(
            &ctx(ScriptedLlm::answering("NO")),
            "q",
            &items(Origin::Vector, 1),
        )
        .await;
        assert_eq!(grade, Grade::Insufficient);
    }

    #[tokio::test]
    async fn precheck_runs_with_only_ephemeral_items() {
        let llm = ScriptedLlm::answering("YES");
        let grade = precheck(&ctx(llm.clone()), "q", &[], &items(Origin::Ephemeral, 2)).await;
        assert_eq!(grade, Grade::Relevant);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
