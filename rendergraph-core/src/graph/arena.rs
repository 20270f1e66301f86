//! Graph Arena
//!
//! Nodes and edges live in flat, insertion-ordered storage and are referred
//! to by dense handles. The graph exclusively owns both; queries hand out
//! borrows only.

use indexmap::IndexMap;

use super::edge::{Edge, EdgeId};
use super::node::{Node, NodeId, NodeKind};
use crate::error::{Error, Result};

/// A declarative render pipeline: typed nodes joined by port-annotated edges.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes, indexed by [`NodeId`].
    nodes: Vec<Node>,

    /// String identifier -> arena index.
    ids: IndexMap<String, NodeId>,

    /// Live edges in insertion order.
    edges: IndexMap<EdgeId, Edge>,

    next_edge: u32,

    present: Option<NodeId>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    ///
    /// Fails on a duplicate identifier or a second `present` node.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        if self.ids.contains_key(node.id()) {
            return Err(Error::DuplicateNode(node.id().to_string()));
        }
        if node.kind() == NodeKind::Present && self.present.is_some() {
            return Err(Error::DuplicatePresentNode);
        }

        let id = NodeId::new(self.nodes.len());
        if node.kind() == NodeKind::Present {
            self.present = Some(id);
        }
        self.ids.insert(node.id().to_string(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Add an edge between two nodes already in the graph.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId> {
        for end in [edge.source(), edge.target()] {
            if end.index() >= self.nodes.len() {
                return Err(Error::UnknownNode(format!("#{}", end.raw())));
            }
        }

        let id = EdgeId::new(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(id, edge);
        Ok(id)
    }

    /// Connect `source:source_port` to `target:target_port` by node identifier.
    pub fn connect(
        &mut self,
        source: &str,
        source_port: usize,
        target: &str,
        target_port: usize,
    ) -> Result<EdgeId> {
        let source = self.require(source)?;
        let target = self.require(target)?;
        self.add_edge(Edge::with_ports(source, source_port, target, target_port))
    }

    /// Detach an edge. Node identity is untouched.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        self.edges.shift_remove(&id)
    }

    /// Get a node by handle.
    ///
    /// Handles are only minted by this graph, so an out-of-range handle is a
    /// caller bug and panics.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Look up a node handle by its string identifier.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    fn require(&self, id: &str) -> Result<NodeId> {
        self.find(id).ok_or_else(|| Error::UnknownNode(id.to_string()))
    }

    /// The `present` node, if the graph has one.
    pub fn present(&self) -> Option<NodeId> {
        self.present
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index), node))
    }

    /// All live edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Edges whose target is `node`.
    pub fn edges_to(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges().filter(move |(_, edge)| edge.target() == node)
    }

    /// Edges whose source is `node`.
    pub fn edges_from(&self, node: NodeId) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges().filter(move |(_, edge)| edge.source() == node)
    }

    /// Whether a direct edge `from -> to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.edges
            .values()
            .any(|edge| edge.source() == from && edge.target() == to)
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::OperatorKind;

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(Node::float("a", 2.0)).unwrap();
        graph.add_node(Node::float("b", 3.0)).unwrap();
        graph
            .add_node(Node::operator("sum", OperatorKind::Addition))
            .unwrap();
        graph.connect("a", 0, "sum", 0).unwrap();
        graph.connect("b", 0, "sum", 1).unwrap();
        graph
    }

    #[test]
    fn add_nodes_and_edges() {
        let graph = sample();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        let ids: Vec<_> = graph.nodes().map(|(_, node)| node.id()).collect();
        assert_eq!(ids, ["a", "b", "sum"]);
    }

    #[test]
    fn adjacency_queries() {
        let graph = sample();
        let a = graph.find("a").unwrap();
        let sum = graph.find("sum").unwrap();

        assert_eq!(graph.edges_to(sum).count(), 2);
        assert_eq!(graph.edges_from(a).count(), 1);
        assert!(graph.has_edge(a, sum));
        assert!(!graph.has_edge(sum, a));
    }

    #[test]
    fn remove_edge_keeps_nodes() {
        let mut graph = sample();
        let a = graph.find("a").unwrap();
        let sum = graph.find("sum").unwrap();

        let (edge_id, _) = graph.edges_from(a).next().unwrap();
        let removed = graph.remove_edge(edge_id).unwrap();
        assert_eq!(removed.source(), a);

        assert!(!graph.has_edge(a, sum));
        assert_eq!(graph.node_count(), 3);
        assert!(graph.remove_edge(edge_id).is_none());

        // Remaining edge keeps its identity.
        let (_, rest) = graph.edges().next().unwrap();
        assert_eq!(rest.target(), sum);
    }

    #[test]
    fn rejects_duplicates() {
        let mut graph = sample();
        assert!(matches!(
            graph.add_node(Node::float("a", 1.0)),
            Err(Error::DuplicateNode(_))
        ));

        graph.add_node(Node::present("out")).unwrap();
        assert!(matches!(
            graph.add_node(Node::present("out2")),
            Err(Error::DuplicatePresentNode)
        ));
    }

    #[test]
    fn connect_requires_known_nodes() {
        let mut graph = sample();
        assert!(matches!(
            graph.connect("a", 0, "nowhere", 0),
            Err(Error::UnknownNode(id)) if id == "nowhere"
        ));
    }
}
