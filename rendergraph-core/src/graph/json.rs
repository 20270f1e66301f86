//! JSON Graph Source
//!
//! Loads a [`Graph`] from the document shape written by the graph editor:
//!
//! ```json
//! {
//!   "nodes": [{ "id": "a", "type": "float", "metadata": { "value": "2.0" } }],
//!   "edges": [{ "source": "a", "target": "out", "metadata": { "source_id": "0", "target_id": "0" } }]
//! }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

use super::arena::Graph;
use super::edge::Edge;
use super::node::{Node, NodeKind};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    nodes: Vec<NodeDocument>,
    #[serde(default)]
    edges: Vec<EdgeDocument>,
}

#[derive(Debug, Deserialize)]
struct NodeDocument {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    metadata: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct EdgeDocument {
    source: String,
    target: String,
    #[serde(default)]
    metadata: IndexMap<String, String>,
}

impl Graph {
    /// Parse a graph from its JSON source.
    ///
    /// Unknown node types fail with [`Error::UnknownNodeType`].
    pub fn from_json(source: &str) -> Result<Self> {
        let document: GraphDocument = serde_json::from_str(source)?;
        let mut graph = Graph::new();

        for node in document.nodes {
            let kind: NodeKind = node.kind.parse()?;
            let mut built = Node::new(node.id, kind);
            for (key, value) in node.metadata {
                built.set_metadata(key, value);
            }
            graph.add_node(built)?;
        }

        for edge in document.edges {
            let source = graph
                .find(&edge.source)
                .ok_or_else(|| Error::UnknownNode(edge.source.clone()))?;
            let target = graph
                .find(&edge.target)
                .ok_or_else(|| Error::UnknownNode(edge.target.clone()))?;

            let mut built = Edge::new(source, target);
            for (key, value) in edge.metadata {
                built.set_metadata(key, value);
            }
            graph.add_edge(built)?;
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded graph from json"
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OperatorKind;

    #[test]
    fn test_parse_simple_graph() {
        let json = r#"{
            "nodes": [
                {"id": "a", "type": "float", "metadata": {"value": "2.0"}},
                {"id": "b", "type": "float", "metadata": {"value": "3.0"}},
                {"id": "sum", "type": "addition"},
                {"id": "out", "type": "present"}
            ],
            "edges": [
                {"source": "a", "target": "sum", "metadata": {"source_id": "0", "target_id": "0"}},
                {"source": "b", "target": "sum", "metadata": {"source_id": "0", "target_id": "1"}},
                {"source": "sum", "target": "out"}
            ]
        }"#;

        let graph = Graph::from_json(json).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);

        let sum = graph.find("sum").unwrap();
        assert_eq!(
            graph.node(sum).kind(),
            NodeKind::Operator(OperatorKind::Addition)
        );
        assert_eq!(graph.node(graph.find("b").unwrap()).metadata("value"), Some("3.0"));
        assert_eq!(graph.present(), graph.find("out"));

        let ports: Vec<_> = graph
            .edges_to(sum)
            .map(|(_, edge)| edge.target_port().unwrap())
            .collect();
        assert_eq!(ports, [0, 1]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = r#"{"nodes": [{"id": "x", "type": "comparison"}]}"#;
        assert!(matches!(
            Graph::from_json(json),
            Err(Error::UnknownNodeType(tag)) if tag == "comparison"
        ));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let json = r#"{
            "nodes": [{"id": "a", "type": "float", "metadata": {"value": "1"}}],
            "edges": [{"source": "a", "target": "ghost"}]
        }"#;
        assert!(matches!(Graph::from_json(json), Err(Error::UnknownNode(id)) if id == "ghost"));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(Graph::from_json("{"), Err(Error::Json(_))));
    }
}
