//! Evaluation Scheduler
//!
//! The scheduler determines the order in which nodes must be evaluated so that
//! every producer runs before its consumers.
//!
//! # Algorithm
//!
//! Kahn's algorithm, run backward from the sink:
//!
//! 1. Build an index-based working copy holding only edges whose target can
//!    reach the sink (everything else can never affect the output)
//! 2. Start the frontier with just the sink
//! 3. Pop a node `n`, append it to the result, and delete every edge into `n`
//! 4. A source `m` joins the frontier once all of its outgoing edges are gone,
//!    that is once every consumer of `m` has been scheduled
//! 5. Any edge left in the working copy lies on a cycle
//!
//! The result is sink-first; [`Schedule::evaluation_order`] walks it in reverse.

use smallvec::SmallVec;

use super::arena::Graph;
use super::node::NodeId;
use crate::error::{Error, Result};

/// A safe evaluation order rooted at the present node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Sink first, sources last.
    order: Vec<NodeId>,

    /// The single predecessor of the sink.
    final_node: NodeId,
}

impl Schedule {
    /// Nodes in the order they were scheduled (sink first).
    pub fn sink_first(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in source-first evaluation order.
    pub fn evaluation_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().rev().copied()
    }

    /// The node whose output the present node shows.
    pub fn final_node(&self) -> NodeId {
        self.final_node
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Working copy of the edge set. Never aliases the graph's own storage.
struct WorkingSet {
    /// `(source, target)` per edge; `None` once deleted.
    edges: Vec<Option<(NodeId, NodeId)>>,

    /// Edge indices entering each node.
    incoming: Vec<SmallVec<[usize; 4]>>,

    /// Live outgoing edge count per node.
    out_degree: Vec<usize>,
}

impl WorkingSet {
    fn build(graph: &Graph, sink: NodeId) -> Self {
        let reachable = Self::reaching(graph, sink);
        let node_count = graph.node_count();

        let mut edges = Vec::new();
        let mut incoming = vec![SmallVec::new(); node_count];
        let mut out_degree = vec![0; node_count];

        for (_, edge) in graph.edges() {
            if !reachable[edge.target().index()] {
                continue;
            }
            incoming[edge.target().index()].push(edges.len());
            out_degree[edge.source().index()] += 1;
            edges.push(Some((edge.source(), edge.target())));
        }

        Self {
            edges,
            incoming,
            out_degree,
        }
    }

    /// Nodes from which `sink` can be reached (including the sink itself).
    fn reaching(graph: &Graph, sink: NodeId) -> Vec<bool> {
        let mut seen = vec![false; graph.node_count()];
        let mut stack = vec![sink];
        seen[sink.index()] = true;

        while let Some(node) = stack.pop() {
            for (_, edge) in graph.edges_to(node) {
                let source = edge.source();
                if !seen[source.index()] {
                    seen[source.index()] = true;
                    stack.push(source);
                }
            }
        }

        seen
    }

    fn remaining(&self) -> usize {
        self.edges.iter().filter(|edge| edge.is_some()).count()
    }
}

/// Computes evaluation orders for a graph.
pub struct Scheduler<'g> {
    graph: &'g Graph,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// Schedule every node that feeds `sink`.
    ///
    /// Fails with [`Error::InvalidPresentNode`] unless the sink has exactly one
    /// predecessor, and with [`Error::CyclicGraph`] if a cycle feeds the sink.
    pub fn schedule(&self, sink: NodeId) -> Result<Schedule> {
        let final_node = self.final_node(sink)?;
        let mut working = WorkingSet::build(self.graph, sink);

        // An edge leaving the sink towards one of its own producers closes a loop.
        if working.out_degree[sink.index()] > 0 {
            return Err(Error::CyclicGraph {
                remaining_edges: working.remaining(),
            });
        }

        let mut order = Vec::new();
        let mut frontier = vec![sink];

        while let Some(node) = frontier.pop() {
            order.push(node);

            for &edge_index in &working.incoming[node.index()] {
                let Some((source, _)) = working.edges[edge_index].take() else {
                    continue;
                };

                let degree = &mut working.out_degree[source.index()];
                *degree -= 1;
                if *degree == 0 {
                    frontier.push(source);
                }
            }
        }

        let remaining_edges = working.remaining();
        if remaining_edges > 0 {
            tracing::debug!(remaining_edges, "cycle detected while scheduling");
            return Err(Error::CyclicGraph { remaining_edges });
        }

        Ok(Schedule { order, final_node })
    }

    fn final_node(&self, sink: NodeId) -> Result<NodeId> {
        let mut predecessors = self.graph.edges_to(sink).map(|(_, edge)| edge.source());

        match (predecessors.next(), predecessors.next()) {
            (Some(node), None) => Ok(node),
            (None, _) => Err(Error::InvalidPresentNode(format!(
                "'{}' has no predecessor",
                self.graph.node(sink).id()
            ))),
            (Some(_), Some(_)) => Err(Error::InvalidPresentNode(format!(
                "'{}' has more than one predecessor",
                self.graph.node(sink).id()
            ))),
        }
    }
}
