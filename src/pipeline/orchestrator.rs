//! The pipeline orchestrator.
//!
//! Drives routing, primary retrieval (vector alongside the session's
//! ephemeral store), the sufficiency precheck, graph escalation, fusion,
//! final grading, and generation. Every backend failure degrades instead of
//! propagating; `run` always produces an answer, even if it is the fallback
//! text.

use std::time::Duration;

use tracing::{debug, warn};

use super::ephemeral;
use super::fusion;
use super::generate::{self, FALLBACK_ANSWER};
use super::grading::{self, Grade};
use super::graph::{self, GraphRetrieval};
use super::intent::{self, UrlIntent};
use super::state::{PipelineStage, RagRequest, RagResponse, RetrievalMode};
use super::vector::{self, VectorRetrieval};
use crate::context::ServiceContext;
use crate::intake::{extract_urls, TextChunker, UrlIntake};
use crate::types::{Origin, RetrievalOutcome, RetrievedItem, VizGraph};

pub struct Pipeline {
    ctx: ServiceContext,
}

impl Pipeline {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub async fn run(&self, request: RagRequest) -> RagResponse {
        let ctx = &self.ctx;
        let mut stages = vec![PipelineStage::Routing];
        let mut trace = Vec::new();
        let mut ingested_urls = Vec::new();

        // The intent gate comes first: a pure summary question never enters
        // retrieval at all. A session with uploaded files never bypasses;
        // the user's question is about their content, not the page alone.
        let urls = extract_urls(&request.question, ctx.config.intake.max_urls);
        if !urls.is_empty() {
            let has_uploads = request.has_temp_files() || request.has_files();
            let url_intent = intent::classify(ctx, &request.question, &urls, has_uploads).await;
            if url_intent == UrlIntent::DirectSummary {
                stages.push(PipelineStage::DirectSummary);
                let (answer, context) = match intent::direct_summary(ctx, &urls[0]).await {
                    Ok(summary) => {
                        let item =
                            RetrievedItem::new(summary.clone(), Origin::UrlDirect, urls[0].clone());
                        (summary, vec![item])
                    }
                    Err(e) => {
                        warn!(url = %urls[0], error = %e, "direct summary failed");
                        trace.push(format!("direct summary of {} failed: {}", urls[0], e));
                        (
                            format!("I couldn't summarize the page at {}: {}", urls[0], e),
                            Vec::new(),
                        )
                    }
                };
                stages.push(PipelineStage::Done);
                return RagResponse {
                    answer,
                    context,
                    viz_graph: VizGraph::default(),
                    cypher: None,
                    stages,
                    trace,
                    used_fallback: false,
                    ingested_urls,
                };
            }
        }

        let mode = if request.has_files() {
            RetrievalMode::VectorOnly
        } else {
            RetrievalMode::Parallel
        };
        debug!(?mode, question = %request.question, "routing decided");

        // Intake runs before primary retrieval so freshly fetched pages are
        // queryable in the same turn. No session means nowhere to stage them.
        if !urls.is_empty() {
            if let Some(session_id) = &request.session_id {
                let intake = UrlIntake::new(
                    ctx.fetcher.clone(),
                    ctx.embedder.clone(),
                    ctx.ephemeral.clone(),
                    TextChunker::new(
                        ctx.config.chunking.chunk_size,
                        ctx.config.chunking.chunk_overlap,
                        ctx.config.chunking.min_chunk_size,
                    ),
                    &ctx.config.intake,
                );
                let report = intake.ingest(session_id, &urls).await;
                for (url, reason) in &report.failed {
                    trace.push(format!("failed to ingest {}: {}", url, reason));
                }
                ingested_urls = report.ingested;
            } else {
                debug!("urls detected but no session, skipping intake");
            }
        }

        // One question embedding, shared by the vector and ephemeral
        // adapters.
        let embedding = match ctx.embedder.embed_query(&request.question).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(error = %e, "question embedding failed");
                None
            }
        };

        stages.push(PipelineStage::RetrievingPrimary);
        let timeout = Duration::from_secs(ctx.config.search.adapter_timeout_secs);

        let vector_fut = async {
            let Some(embedding) = &embedding else {
                return VectorRetrieval::unavailable("question embedding failed");
            };
            let retrieval = vector::retrieve(
                ctx,
                embedding,
                &request.org_ids,
                request.file_filter.as_deref(),
            );
            match tokio::time::timeout(timeout, retrieval).await {
                Ok(retrieval) => retrieval,
                Err(_) => {
                    warn!("vector retrieval timed out");
                    VectorRetrieval::unavailable("vector retrieval timed out")
                }
            }
        };
        let ephemeral_fut = async {
            let qualifies = request.session_id.as_deref().is_some_and(|session_id| {
                request.has_temp_files()
                    || !urls.is_empty()
                    || ctx.ephemeral.has_data(session_id)
            });
            match (qualifies, &request.session_id, &embedding) {
                (true, Some(session_id), Some(embedding)) => {
                    ephemeral::retrieve(ctx, session_id, embedding)
                }
                _ => RetrievalOutcome::Empty,
            }
        };
        let (vector_retrieval, ephemeral_outcome) = futures::join!(vector_fut, ephemeral_fut);
        trace.extend(vector_retrieval.warnings);
        let vector_items = outcome_items(vector_retrieval.outcome, "vector", &mut trace);
        let ephemeral_items = outcome_items(ephemeral_outcome, "session", &mut trace);

        stages.push(PipelineStage::Evaluating);
        let precheck_grade =
            grading::precheck(ctx, &request.question, &vector_items, &ephemeral_items).await;

        // Graph escalation: only in parallel mode and only when the primary
        // evidence fell short.
        let mut graph_items = Vec::new();
        let mut viz_graph = VizGraph::default();
        let mut cypher = None;
        if mode == RetrievalMode::Parallel && precheck_grade == Grade::Insufficient {
            stages.push(PipelineStage::RetrievingSecondary);
            let org_id = request.org_ids.first().map(String::as_str);
            let retrieval = match tokio::time::timeout(
                timeout,
                graph::retrieve(ctx, &request.question, org_id),
            )
            .await
            {
                Ok(retrieval) => retrieval,
                Err(_) => {
                    warn!("graph retrieval timed out");
                    GraphRetrieval {
                        outcome: RetrievalOutcome::Unavailable("graph retrieval timed out".into()),
                        viz: VizGraph::default(),
                        cypher: None,
                    }
                }
            };
            graph_items = outcome_items(retrieval.outcome, "graph", &mut trace);
            viz_graph = retrieval.viz;
            cypher = retrieval.cypher;
        }

        stages.push(PipelineStage::Fusing);
        let fused = fusion::fuse(
            &request.question,
            vector_items,
            graph_items,
            ephemeral_items,
            ctx.reranker.as_ref(),
            &ctx.config.search,
        )
        .await;

        stages.push(PipelineStage::Grading);
        let final_grade = grading::final_grade(ctx, &request.question, &fused).await;

        let (answer, context, used_fallback) = if final_grade == Grade::Relevant {
            stages.push(PipelineStage::Generating);
            let answer = generate::generate(
                ctx,
                &request.question,
                &fused,
                request.custom_prompt.as_deref(),
            )
            .await;
            (answer, fused, false)
        } else {
            stages.push(PipelineStage::Fallback);
            (FALLBACK_ANSWER.to_string(), Vec::new(), true)
        };

        stages.push(PipelineStage::Done);
        RagResponse {
            answer,
            context,
            viz_graph,
            cypher,
            stages,
            trace,
            used_fallback,
            ingested_urls,
        }
    }
}

/// Unwrap an adapter outcome, recording unavailability in the trace so a
/// degraded run is visible to the caller, not just the logs.
fn outcome_items(
    outcome: RetrievalOutcome,
    adapter: &str,
    trace: &mut Vec<String>,
) -> Vec<RetrievedItem> {
    match outcome {
        RetrievalOutcome::Hit(items) => items,
        RetrievalOutcome::Empty => Vec::new(),
        RetrievalOutcome::Unavailable(reason) => {
            trace.push(format!("{} retrieval unavailable: {}", adapter, reason));
            Vec::new()
        }
    }
}
