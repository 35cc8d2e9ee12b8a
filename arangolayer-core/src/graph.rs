//! Named graph declarations.
//!
//! A graph owns no data. It names the edge collections that take part in it, which vertex
//! collections each of them connects, and vertex collections without edges (orphans). The
//! serialized form is the definition the gharial API expects:
//!
//! ```json
//! {"name": "social", "edgeDefinitions": [{"collection": "knows", "from": ["users"], "to": ["users"]}],
//!  "orphanCollections": ["groups"]}
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{ArangoError, ArangoResult},
    schema::{Schema, SchemaKind},
};

/// One edge collection of a graph and the vertex collections it may connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    /// Name of the edge collection.
    pub collection: String,
    /// Vertex collections allowed as `_from`.
    pub from: Vec<String>,
    /// Vertex collections allowed as `_to`.
    pub to: Vec<String>,
}

/// A named graph as the gharial API describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefinition {
    pub name: String,
    pub edge_definitions: Vec<EdgeDefinition>,
    /// Vertex collections that no edge definition mentions.
    #[serde(default)]
    pub orphan_collections: Vec<String>,
}

impl GraphDefinition {
    pub fn builder(name: impl Into<String>) -> GraphBuilder {
        GraphBuilder {
            name: name.into(),
            edges: Vec::new(),
            vertices: Vec::new(),
        }
    }

    /// Every vertex collection of the graph, in declaration order and without duplicates.
    pub fn vertex_collections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let declared = self
            .edge_definitions
            .iter()
            .flat_map(|edge| edge.from.iter().chain(edge.to.iter()))
            .chain(self.orphan_collections.iter());

        for name in declared {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn edge_collections(&self) -> Vec<&str> {
        self.edge_definitions
            .iter()
            .map(|edge| edge.collection.as_str())
            .collect()
    }
}

/// Builder for [`GraphDefinition`].
#[derive(Debug)]
pub struct GraphBuilder {
    name: String,
    edges: Vec<(Arc<Schema>, Vec<Arc<Schema>>, Vec<Arc<Schema>>)>,
    vertices: Vec<Arc<Schema>>,
}

impl GraphBuilder {
    /// Declares an edge collection and the vertex collections it connects.
    pub fn edge(mut self, edge: &Arc<Schema>, from: &[&Arc<Schema>], to: &[&Arc<Schema>]) -> Self {
        let collect = |schemas: &[&Arc<Schema>]| -> Vec<Arc<Schema>> {
            schemas.iter().map(|s| Arc::clone(s)).collect()
        };
        self.edges.push((Arc::clone(edge), collect(from), collect(to)));
        self
    }

    /// Declares a vertex collection. Vertex collections used by no edge definition become
    /// orphan collections.
    pub fn vertex(mut self, vertex: &Arc<Schema>) -> Self {
        self.vertices.push(Arc::clone(vertex));
        self
    }

    /// Validates the declaration and builds the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Schema`] if an edge definition does not use an edge schema, a
    /// vertex is not a document schema, an edge collection is declared twice, or an edge
    /// definition has no `from` or `to` collections.
    pub fn build(self) -> ArangoResult<GraphDefinition> {
        let invalid = |reason: String| ArangoError::Schema(format!("graph {}: {reason}", self.name));
        let check_vertex = |schema: &Arc<Schema>| {
            if schema.kind() == SchemaKind::Document {
                Ok(schema.name().to_string())
            } else {
                Err(invalid(format!("{} is not a document collection", schema.name())))
            }
        };

        let mut edge_definitions: Vec<EdgeDefinition> = Vec::with_capacity(self.edges.len());
        for (edge, from, to) in &self.edges {
            if !edge.is_edge() {
                return Err(invalid(format!("{} is not an edge collection", edge.name())));
            }
            if edge_definitions.iter().any(|def| def.collection == edge.name()) {
                return Err(invalid(format!("edge collection {} declared twice", edge.name())));
            }
            if from.is_empty() || to.is_empty() {
                return Err(invalid(format!("edge collection {} connects nothing", edge.name())));
            }
            edge_definitions.push(EdgeDefinition {
                collection: edge.name().to_string(),
                from: from.iter().map(&check_vertex).collect::<ArangoResult<_>>()?,
                to: to.iter().map(&check_vertex).collect::<ArangoResult<_>>()?,
            });
        }

        let mut orphan_collections: Vec<String> = Vec::new();
        for vertex in &self.vertices {
            let name = check_vertex(vertex)?;
            let connected = edge_definitions
                .iter()
                .any(|def| def.from.contains(&name) || def.to.contains(&name));
            if !connected && !orphan_collections.contains(&name) {
                orphan_collections.push(name);
            }
        }

        Ok(GraphDefinition {
            name: self.name.clone(),
            edge_definitions,
            orphan_collections,
        })
    }
}
