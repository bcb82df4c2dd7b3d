//! Graph retrieval adapter: text-to-Cypher generation, execution, and
//! conversion of the results into both context text and a visualization
//! payload.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use tracing::{debug, warn};

use crate::context::ServiceContext;
use crate::storage::graph::{GraphRecord, GraphStore};
use crate::types::{Origin, RetrievalOutcome, RetrievedItem, VizGraph, VizLink, VizNode};

/// Graph hits carry a fixed score: Cypher results are exact matches, not
/// similarity-ranked.
const GRAPH_HIT_SCORE: f32 = 0.8;

const VIZ_FALLBACK_QUERY: &str = "MATCH (n) RETURN n LIMIT 10";

static CODE_BLOCK_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"```(?:cypher)?\s*([\s\S]*?)```").expect("code block regex is valid")
});

pub struct GraphRetrieval {
    pub outcome: RetrievalOutcome,
    pub viz: VizGraph,
    pub cypher: Option<String>,
}

impl GraphRetrieval {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            outcome: RetrievalOutcome::Unavailable(reason.into()),
            viz: VizGraph::default(),
            cypher: None,
        }
    }
}

pub async fn retrieve(ctx: &ServiceContext, question: &str, org_id: Option<&str>) -> GraphRetrieval {
    let Some(store) = &ctx.graph_store else {
        return GraphRetrieval::unavailable("no graph store configured");
    };

    let cypher = match generate_cypher(ctx, question, org_id).await {
        Ok(cypher) => cypher,
        Err(e) => {
            warn!(error = %e, "cypher generation failed");
            return GraphRetrieval::unavailable(format!("cypher generation failed: {}", e));
        }
    };
    debug!(%cypher, "generated cypher");

    let records = match store.run(&cypher).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "graph query failed");
            return GraphRetrieval::unavailable(format!("graph query failed: {}", e));
        }
    };

    let mut viz = records_to_viz(&records);
    // An answer-shaped query (scalar projections) gives the UI nothing to
    // draw; fall back to a neighborhood sample so the panel is not blank.
    if viz.nodes.is_empty() {
        if let Ok(sample) = store.run(VIZ_FALLBACK_QUERY).await {
            viz = records_to_viz(&sample);
        }
    }

    let context_text = records_to_text(&records);
    let outcome = if context_text.is_empty() {
        RetrievalOutcome::Empty
    } else {
        let mut item = RetrievedItem::new(context_text, Origin::Graph, "graph")
            .with_score(GRAPH_HIT_SCORE);
        item.metadata.insert("cypher".to_string(), cypher.clone());
        RetrievalOutcome::Hit(vec![item])
    };

    GraphRetrieval {
        outcome,
        viz,
        cypher: Some(cypher),
    }
}

async fn generate_cypher(
    ctx: &ServiceContext,
    question: &str,
    org_id: Option<&str>,
) -> Result<String> {
    let schema = ctx.schemas.get(org_id);
    let prompt = ctx
        .config
        .prompts
        .cypher
        .replace("{schema}", &schema.to_prompt_block())
        .replace("{question}", question);

    let raw = ctx.llm.invoke(&prompt).await?;
    let cypher = extract_cypher(&raw);
    if cypher.is_empty() {
        anyhow::bail!("model returned an empty cypher statement");
    }
    Ok(cypher)
}

/// Strip a markdown code fence from model output, if present.
pub fn extract_cypher(text: &str) -> String {
    if let Some(caps) = CODE_BLOCK_RE.captures(text) {
        if let Some(code) = caps.get(1) {
            return code.as_str().trim().to_string();
        }
    }
    text.trim().to_string()
}

/// Flatten records into the textual context handed to grading/generation.
fn records_to_text(records: &[GraphRecord]) -> String {
    let mut lines = Vec::new();
    for record in records {
        match record {
            GraphRecord::Node(node) => {
                lines.push(format!("{} ({})", node.label, node.node_type));
            }
            GraphRecord::Relationship(rel) => {
                lines.push(format!("{} -{}-> {}", rel.source, rel.label, rel.target));
            }
            GraphRecord::Path {
                nodes,
                relationships,
            } => {
                let names: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
                let rels: Vec<&str> = relationships.iter().map(|r| r.label.as_str()).collect();
                lines.push(format!("path: {} via [{}]", names.join(" -> "), rels.join(", ")));
            }
            GraphRecord::Scalar { columns } => {
                let mut parts: Vec<String> = columns
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, scalar_display(v)))
                    .collect();
                parts.sort();
                lines.push(parts.join(", "));
            }
        }
    }
    lines.join("\n")
}

fn scalar_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert records into the node/link payload for the caller's UI. Nodes and
/// links are deduplicated by id; nodes without any links get sequential
/// placeholder links so the graph renders connected.
fn records_to_viz(records: &[GraphRecord]) -> VizGraph {
    let mut viz = VizGraph::default();
    let mut node_ids = HashSet::new();
    let mut link_ids = HashSet::new();

    let mut push_node = |viz: &mut VizGraph, node: &crate::storage::graph::GraphNode| {
        if node_ids.insert(node.id.clone()) {
            viz.nodes.push(VizNode {
                id: node.id.clone(),
                label: node.label.clone(),
                node_type: node.node_type.clone(),
                properties: node.properties.clone(),
            });
        }
    };
    let mut push_link = |viz: &mut VizGraph, rel: &crate::storage::graph::GraphRelationship| {
        if link_ids.insert(rel.id.clone()) {
            viz.links.push(VizLink {
                id: Some(rel.id.clone()),
                source: rel.source.clone(),
                target: rel.target.clone(),
                label: rel.label.clone(),
            });
        }
    };

    for record in records {
        match record {
            GraphRecord::Node(node) => push_node(&mut viz, node),
            GraphRecord::Relationship(rel) => push_link(&mut viz, rel),
            GraphRecord::Path {
                nodes,
                relationships,
            } => {
                for node in nodes {
                    push_node(&mut viz, node);
                }
                for rel in relationships {
                    push_link(&mut viz, rel);
                }
            }
            GraphRecord::Scalar { .. } => {}
        }
    }

    if viz.nodes.len() > 1 && viz.links.is_empty() {
        for pair in viz.nodes.windows(2) {
            viz.links.push(VizLink {
                id: None,
                source: pair[0].id.clone(),
                target: pair[1].id.clone(),
                label: "RELATED".to_string(),
            });
        }
    }

    viz
}
