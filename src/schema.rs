//! Knowledge-graph schema used to constrain text-to-Cypher generation.
//!
//! A schema names the node types, relationship types, and the
//! (source, relationship, target) triples a graph may contain. Organizations
//! can override the built-in default; overrides are validated on write so a
//! triple can never reference an undeclared type.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub node_types: Vec<String>,
    pub relationship_types: Vec<String>,
    /// (source_type, relationship, target_type) triples.
    pub patterns: Vec<(String, String, String)>,
}

impl GraphSchema {
    /// Built-in default schema for back-office integration graphs: event-driven
    /// microservices, routing components, queues, files and deployments.
    pub fn default_schema() -> Self {
        let node_types = [
            "Microservice",
            "Event",
            "Component",
            "Interface",
            "Country",
            "File",
            "DownstreamSystem",
            "Database",
            "Queue",
            "API",
        ];
        let relationship_types = [
            "TRIGGERS",
            "ROUTES_TO",
            "CALLS",
            "STORES_TO",
            "GENERATES",
            "SENT_VIA",
            "DEPLOYED_FOR",
            "CONSUMES_FROM",
            "PUBLISHES_TO",
            "DEPENDS_ON",
            "RECEIVES_FROM",
            "TRANSFORMS",
        ];
        let patterns = [
            ("Event", "TRIGGERS", "Microservice"),
            ("Microservice", "GENERATES", "Event"),
            ("Microservice", "ROUTES_TO", "Component"),
            ("Component", "ROUTES_TO", "Microservice"),
            ("Microservice", "CALLS", "Microservice"),
            ("Microservice", "CALLS", "API"),
            ("Microservice", "DEPENDS_ON", "Microservice"),
            ("Microservice", "STORES_TO", "Database"),
            ("Microservice", "STORES_TO", "DownstreamSystem"),
            ("Microservice", "RECEIVES_FROM", "DownstreamSystem"),
            ("Microservice", "GENERATES", "File"),
            ("File", "SENT_VIA", "Interface"),
            ("Microservice", "PUBLISHES_TO", "Queue"),
            ("Microservice", "CONSUMES_FROM", "Queue"),
            ("Microservice", "DEPLOYED_FOR", "Country"),
        ];

        Self {
            node_types: node_types.iter().map(|s| s.to_string()).collect(),
            relationship_types: relationship_types.iter().map(|s| s.to_string()).collect(),
            patterns: patterns
                .iter()
                .map(|(s, r, t)| (s.to_string(), r.to_string(), t.to_string()))
                .collect(),
        }
    }

    /// Resolve the schema for an organization, falling back to the built-in
    /// default when the org carries no custom schema.
    pub fn for_org(custom: Option<&GraphSchema>) -> GraphSchema {
        custom.cloned().unwrap_or_else(Self::default_schema)
    }

    /// Validate that every pattern references declared node and relationship
    /// types. Called before a custom schema is stored.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_types.is_empty() {
            return Err("node_types must not be empty".into());
        }
        if self.relationship_types.is_empty() {
            return Err("relationship_types must not be empty".into());
        }
        for (i, (source, rel, target)) in self.patterns.iter().enumerate() {
            if !self.node_types.contains(source) {
                return Err(format!(
                    "pattern {}: source '{}' not in node_types",
                    i, source
                ));
            }
            if !self.relationship_types.contains(rel) {
                return Err(format!(
                    "pattern {}: relationship '{}' not in relationship_types",
                    i, rel
                ));
            }
            if !self.node_types.contains(target) {
                return Err(format!(
                    "pattern {}: target '{}' not in node_types",
                    i, target
                ));
            }
        }
        Ok(())
    }

    /// Render the schema into the block of text handed to the text-to-Cypher
    /// prompt.
    pub fn to_prompt_block(&self) -> String {
        let patterns: Vec<String> = self
            .patterns
            .iter()
            .map(|(s, r, t)| format!("(:{})-[:{}]->(:{})", s, r, t))
            .collect();
        format!(
            "Node types: {}\nRelationship types: {}\nAllowed patterns:\n{}",
            self.node_types.join(", "),
            self.relationship_types.join(", "),
            patterns.join("\n")
        )
    }
}

/// Per-organization schema overrides.
///
/// Most orgs use the built-in default; an org with its own graph layout
/// registers a custom schema, which is validated before it is stored.
#[derive(Default)]
pub struct SchemaRegistry {
    custom: RwLock<HashMap<String, GraphSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, org_id: &str, schema: GraphSchema) -> Result<(), String> {
        schema.validate()?;
        self.custom.write().insert(org_id.to_string(), schema);
        Ok(())
    }

    pub fn get(&self, org_id: Option<&str>) -> GraphSchema {
        let custom = self.custom.read();
        GraphSchema::for_org(org_id.and_then(|id| custom.get(id)))
    }

    pub fn remove(&self, org_id: &str) -> bool {
        self.custom.write().remove(org_id).is_some()
    }
}
