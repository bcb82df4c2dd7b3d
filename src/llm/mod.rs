//! LLM capability consumed at the pipeline's decision points.
//!
//! The core only needs two calls: a single-prompt `invoke` for
//! classification/grading and a `chat` call for generation. Streaming is the
//! surrounding API layer's concern and deliberately absent here.

pub mod external;

pub use external::ExternalLlm;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-prompt completion. Used for classification and grading.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Chat-mode completion with explicit roles. Used for answer generation.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;
}
