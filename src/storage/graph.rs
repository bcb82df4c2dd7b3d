//! Graph store adapter over Neo4j.
//!
//! Raw query results are normalized into [`GraphRecord`] immediately after
//! execution, so downstream visualization formatting never has to branch on
//! the driver's heterogeneous row shapes.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use neo4rs::{Graph, Query};

use crate::errors::StoreError;

/// A normalized graph query record.
#[derive(Debug, Clone)]
pub enum GraphRecord {
    Node(GraphNode),
    Relationship(GraphRelationship),
    Path {
        nodes: Vec<GraphNode>,
        relationships: Vec<GraphRelationship>,
    },
    /// Plain column values (strings, numbers, property projections).
    Scalar {
        columns: HashMap<String, serde_json::Value>,
    },
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub node_type: String,
    pub properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct GraphRelationship {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a Cypher query and return normalized records.
    async fn run(&self, cypher: &str) -> Result<Vec<GraphRecord>>;
}

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| StoreError::unavailable(format!("failed to connect to Neo4j: {}", e)))?;
        Ok(Self { graph })
    }

    fn node_from_bolt(node: &neo4rs::Node) -> GraphNode {
        let mut properties = HashMap::new();
        for key in node.keys() {
            if let Ok(value) = node.get::<serde_json::Value>(key) {
                properties.insert(key.to_string(), value);
            }
        }

        let label = ["name", "id", "title"]
            .iter()
            .find_map(|k| properties.get(*k).and_then(|v| v.as_str().map(String::from)))
            .or_else(|| node.labels().first().map(|l| l.to_string()))
            .unwrap_or_else(|| node.id().to_string());

        let node_type = node
            .labels()
            .first()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "Entity".to_string());

        GraphNode {
            id: node.id().to_string(),
            label: truncate_label(&label),
            node_type,
            properties,
        }
    }

    fn relationship_from_bolt(rel: &neo4rs::Relation) -> GraphRelationship {
        GraphRelationship {
            id: rel.id().to_string(),
            source: rel.start_node_id().to_string(),
            target: rel.end_node_id().to_string(),
            label: rel.typ().to_string(),
        }
    }
}

/// Relationships inside a path come back unbound (no endpoint ids). The
/// driver guarantees path order, so relationship i connects nodes i and i+1;
/// endpoints are recovered from that order.
fn bind_path_relationships(
    nodes: &[GraphNode],
    rels: Vec<(String, String)>,
) -> Vec<GraphRelationship> {
    rels.into_iter()
        .enumerate()
        .map(|(i, (id, label))| GraphRelationship {
            id,
            source: nodes.get(i).map(|n| n.id.clone()).unwrap_or_default(),
            target: nodes.get(i + 1).map(|n| n.id.clone()).unwrap_or_default(),
            label,
        })
        .collect()
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn run(&self, cypher: &str) -> Result<Vec<GraphRecord>> {
        let columns = return_columns(cypher);

        let mut stream = self
            .graph
            .execute(Query::new(cypher.to_string()))
            .await
            .map_err(|e| StoreError::unavailable(format!("Neo4j query failed: {}", e)))?;

        let mut records = Vec::new();

        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| StoreError::unavailable(format!("failed to read Neo4j row: {}", e)))?
        {
            let mut scalars = HashMap::new();

            for column in &columns {
                if let Ok(path) = row.get::<neo4rs::Path>(column) {
                    let nodes: Vec<GraphNode> =
                        path.nodes().iter().map(Self::node_from_bolt).collect();
                    let rels = path
                        .rels()
                        .iter()
                        .map(|r| (r.id().to_string(), r.typ().to_string()))
                        .collect();
                    records.push(GraphRecord::Path {
                        relationships: bind_path_relationships(&nodes, rels),
                        nodes,
                    });
                } else if let Ok(node) = row.get::<neo4rs::Node>(column) {
                    records.push(GraphRecord::Node(Self::node_from_bolt(&node)));
                } else if let Ok(rel) = row.get::<neo4rs::Relation>(column) {
                    records.push(GraphRecord::Relationship(Self::relationship_from_bolt(&rel)));
                } else if let Ok(value) = row.get::<serde_json::Value>(column) {
                    scalars.insert(column.clone(), value);
                }
            }

            if !scalars.is_empty() {
                records.push(GraphRecord::Scalar { columns: scalars });
            }
        }

        Ok(records)
    }
}

fn truncate_label(label: &str) -> String {
    label.chars().take(30).collect()
}

/// Extract the column names a Cypher query returns.
///
/// The driver keys row values by RETURN expression (or its alias), so a
/// generated query like `MATCH (n:Service) RETURN n.name AS name LIMIT 5`
/// yields the single column `name`. Splitting respects parens/brackets so
/// function calls with commas don't break columns apart.
pub fn return_columns(cypher: &str) -> Vec<String> {
    let upper = cypher.to_uppercase();
    let Some(pos) = upper.rfind("RETURN") else {
        return Vec::new();
    };
    let mut clause = &cypher[pos + "RETURN".len()..];

    for terminator in ["ORDER BY", "LIMIT", "SKIP", "UNION"] {
        if let Some(idx) = clause.to_uppercase().find(terminator) {
            clause = &clause[..idx];
        }
    }

    let mut columns = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in clause.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                push_column(&mut columns, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_column(&mut columns, &current);
    columns
}

fn push_column(columns: &mut Vec<String>, expr: &str) {
    let expr = expr.trim().trim_end_matches(';').trim();
    if expr.is_empty() {
        return;
    }
    // Honor an alias when present; otherwise the expression itself is the key.
    let upper = expr.to_uppercase();
    let name = if let Some(idx) = upper.rfind(" AS ") {
        expr[idx + 4..].trim().to_string()
    } else {
        expr.trim_start_matches("DISTINCT ")
            .trim_start_matches("distinct ")
            .trim()
            .to_string()
    };
    if !name.is_empty() {
        columns.push(name);
    }
}
