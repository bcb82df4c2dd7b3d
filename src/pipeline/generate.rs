//! Answer generation from fused context, plus the terminal answers for the
//! two failure shapes: the fixed fallback (nothing relevant found, no model
//! call) and the apologetic answer for a generation error.

use crate::context::ServiceContext;
use crate::llm::ChatMessage;
use crate::types::RetrievedItem;

pub const FALLBACK_ANSWER: &str = "I couldn't find relevant information in the knowledge \
base to answer your question. Try rephrasing the question, or add documents or URLs that \
cover the topic.";

/// Upstream bounds context to the configured maximum already; this is a hard
/// cap on top of that.
const MAX_SOURCE_BLOCKS: usize = 10;

const ERROR_DETAIL_CHARS: usize = 200;

/// Generate an answer from the fused context. Never fails: a generation
/// error becomes an apologetic answer carrying the truncated error detail.
pub async fn generate(
    ctx: &ServiceContext,
    question: &str,
    items: &[RetrievedItem],
    custom_system: Option<&str>,
) -> String {
    let user_prompt = ctx
        .config
        .prompts
        .generator_user
        .replace("{question}", question)
        .replace("{context}", &context_block(items));
    let system_prompt = custom_system.unwrap_or(&ctx.config.prompts.generator_system);

    let messages = [
        ChatMessage::system(system_prompt),
        ChatMessage::user(user_prompt),
    ];
    match ctx.llm.chat(&messages).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %e, "answer generation failed");
            let detail: String = e.to_string().chars().take(ERROR_DETAIL_CHARS).collect();
            format!(
                "I apologize, but I ran into an error while generating the answer: {}",
                detail
            )
        }
    }
}

/// Render fused items into the `[Source N]` blocks the generator prompt
/// expects.
pub fn context_block(items: &[RetrievedItem]) -> String {
    items
        .iter()
        .take(MAX_SOURCE_BLOCKS)
        .enumerate()
        .map(|(i, item)| format!("[Source {}]\n{}", i + 1, item.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
