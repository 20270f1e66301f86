//! Graph Edges

use indexmap::IndexMap;

use super::node::NodeId;

/// Metadata key naming the output port on the source node.
pub const SOURCE_PORT: &str = "source_id";

/// Metadata key naming the input port on the target node.
pub const TARGET_PORT: &str = "target_id";

/// Stable identifier of an edge. Survives removal of other edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

impl EdgeId {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// A directed connection from an output port of `source` to an input port of `target`.
#[derive(Debug, Clone)]
pub struct Edge {
    source: NodeId,
    target: NodeId,
    metadata: IndexMap<String, String>,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            metadata: IndexMap::new(),
        }
    }

    /// Create an edge wired from `source_port` to `target_port`.
    pub fn with_ports(source: NodeId, source_port: usize, target: NodeId, target_port: usize) -> Self {
        let mut edge = Self::new(source, target);
        edge.set_metadata(SOURCE_PORT, source_port.to_string());
        edge.set_metadata(TARGET_PORT, target_port.to_string());
        edge
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Output port index on the source node. A missing key means port 0.
    ///
    /// On a malformed value the raw string is returned as the error.
    pub fn source_port(&self) -> Result<usize, &str> {
        self.port(SOURCE_PORT)
    }

    /// Input port index on the target node. A missing key means port 0.
    pub fn target_port(&self) -> Result<usize, &str> {
        self.port(TARGET_PORT)
    }

    fn port(&self, key: &str) -> Result<usize, &str> {
        match self.metadata(key) {
            None => Ok(0),
            Some(raw) => raw.trim().parse().map_err(|_| raw),
        }
    }
}
