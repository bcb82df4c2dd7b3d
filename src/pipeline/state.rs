//! Request, response, and stage bookkeeping for a pipeline run.

use serde::{Deserialize, Serialize};

use crate::types::{RetrievedItem, VizGraph};

/// One question, scoped to organizations and optionally a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagRequest {
    pub question: String,
    /// Organizations whose collections may be searched.
    pub org_ids: Vec<String>,
    /// Sessions carry the ephemeral store scope; without one, URL intake and
    /// ephemeral retrieval are skipped.
    pub session_id: Option<String>,
    /// When present, vector retrieval is restricted to these document ids
    /// and the run uses vector-only routing.
    pub file_filter: Option<Vec<String>>,
    /// Temporary files already staged in the session store.
    pub temp_file_ids: Option<Vec<String>>,
    /// Overrides the configured generator system prompt for this request.
    pub custom_prompt: Option<String>,
}

impl RagRequest {
    pub fn new(question: impl Into<String>, org_ids: Vec<String>) -> Self {
        Self {
            question: question.into(),
            org_ids,
            session_id: None,
            file_filter: None,
            temp_file_ids: None,
            custom_prompt: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_file_filter(mut self, files: Vec<String>) -> Self {
        self.file_filter = Some(files);
        self
    }

    pub fn with_temp_files(mut self, files: Vec<String>) -> Self {
        self.temp_file_ids = Some(files);
        self
    }

    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    pub fn has_files(&self) -> bool {
        self.file_filter.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub fn has_temp_files(&self) -> bool {
        self.temp_file_ids.as_ref().is_some_and(|f| !f.is_empty())
    }
}

/// How retrieval fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Pinned files: vector search only, restricted to those documents.
    /// The graph adapter is never eligible.
    VectorOnly,
    /// Vector (and ephemeral) primary, with graph escalation available.
    Parallel,
}

/// Stages a run passes through, recorded in order for the response trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Routing,
    DirectSummary,
    RetrievingPrimary,
    Evaluating,
    RetrievingSecondary,
    Fusing,
    Grading,
    Generating,
    Fallback,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    /// Fused context the answer was generated from. Fallback answers carry
    /// none; a direct summary carries exactly one URL-tagged item.
    pub context: Vec<RetrievedItem>,
    pub viz_graph: VizGraph,
    /// Cypher generated for graph retrieval, when that adapter ran.
    pub cypher: Option<String>,
    pub stages: Vec<PipelineStage>,
    /// Human-readable progress messages: adapter outages, timeouts, per-org
    /// query failures, intake failures. Empty on a clean run.
    pub trace: Vec<String>,
    pub used_fallback: bool,
    /// URLs ingested into the session store during this run.
    pub ingested_urls: Vec<String>,
}

impl RagResponse {
    pub fn reached(&self, stage: PipelineStage) -> bool {
        self.stages.contains(&stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_filter_means_no_files() {
        let request = RagRequest::new("q", vec!["org1".into()]).with_file_filter(Vec::new());
        assert!(!request.has_files());
    }

    #[test]
    fn populated_file_filter_means_files() {
        let request =
            RagRequest::new("q", vec!["org1".into()]).with_file_filter(vec!["doc1".into()]);
        assert!(request.has_files());
    }
}
