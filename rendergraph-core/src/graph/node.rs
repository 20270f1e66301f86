//! Graph Nodes
//!
//! This module defines the node types that live in the render graph.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::Error;

/// Dense index of a node inside its [`Graph`](super::Graph) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Position of the node in insertion order.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Scalar operators available as graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    // Arithmetic
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Negation,
    Absolute,
    MultiplyAdd,

    // Comparison
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,

    // Logical
    Not,
    And,
    Or,
}

impl OperatorKind {
    /// All operator kinds, in declaration order.
    pub const ALL: [OperatorKind; 16] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiplication,
        Self::Division,
        Self::Negation,
        Self::Absolute,
        Self::MultiplyAdd,
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Not,
        Self::And,
        Self::Or,
    ];

    /// The type tag used for this operator in graph sources.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Subtraction => "subtraction",
            Self::Multiplication => "multiplication",
            Self::Division => "division",
            Self::Negation => "negation",
            Self::Absolute => "absolute",
            Self::MultiplyAdd => "multiply-add",
            Self::Equal => "equal",
            Self::NotEqual => "not-equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater-or-equal",
            Self::Less => "less",
            Self::LessOrEqual => "less-or-equal",
            Self::Not => "not",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    /// Number of input ports.
    pub fn arity(&self) -> usize {
        match self {
            Self::Negation | Self::Absolute | Self::Not => 1,
            Self::MultiplyAdd => 3,
            _ => 2,
        }
    }

    /// Logical operators work on bools and carry no numeric mode.
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::Not | Self::And | Self::Or)
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }
}

/// The kind of node in the render graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The unique sink. Its single predecessor is the final output.
    Present,

    /// A GPU texture. Pass-through for values staged by the pass that renders it.
    Texture,

    /// A float constant. Data only, emits no instructions.
    Float,

    /// A render pass backed by a registered operation.
    Pass,

    /// A scalar operator evaluated by the VM.
    Operator(OperatorKind),
}

impl NodeKind {
    /// The type tag used for this kind in graph sources.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Texture => "texture",
            Self::Float => "float",
            Self::Pass => "pass",
            Self::Operator(op) => op.tag(),
        }
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "present" => Ok(Self::Present),
            "texture" => Ok(Self::Texture),
            "float" => Ok(Self::Float),
            "pass" => Ok(Self::Pass),
            other => OperatorKind::from_tag(other)
                .map(Self::Operator)
                .ok_or_else(|| Error::UnknownNodeType(other.to_string())),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A node in the render graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique string identifier, as written in the graph source.
    id: String,

    /// What kind of node this is.
    kind: NodeKind,

    /// Free-form string metadata (`value`, `format`, `subtype`, `mode`, ...).
    metadata: IndexMap<String, String>,
}

impl Node {
    /// Create a new node with the given identifier and kind.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            metadata: IndexMap::new(),
        }
    }

    /// Create a float constant node.
    pub fn float(id: impl Into<String>, value: f32) -> Self {
        Self::new(id, NodeKind::Float).with_metadata("value", value.to_string())
    }

    /// Create a texture node with the given format identifier.
    pub fn texture(id: impl Into<String>, format: &str) -> Self {
        Self::new(id, NodeKind::Texture).with_metadata("format", format)
    }

    /// Create a pass node backed by the operation registered as `subtype`.
    pub fn pass(id: impl Into<String>, subtype: &str) -> Self {
        Self::new(id, NodeKind::Pass).with_metadata("subtype", subtype)
    }

    /// Create an operator node.
    pub fn operator(id: impl Into<String>, op: OperatorKind) -> Self {
        Self::new(id, NodeKind::Operator(op))
    }

    /// Create the present node.
    pub fn present(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Present)
    }

    /// Builder-style metadata insertion.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get the node's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Look up a metadata value.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Set a metadata value, replacing any previous one.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// All metadata in insertion order.
    pub fn metadata_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kinds_parse_from_tags() {
        assert_eq!("present".parse::<NodeKind>().unwrap(), NodeKind::Present);
        assert_eq!("texture".parse::<NodeKind>().unwrap(), NodeKind::Texture);
        assert_eq!(
            "greater-or-equal".parse::<NodeKind>().unwrap(),
            NodeKind::Operator(OperatorKind::GreaterOrEqual)
        );
        assert!(matches!(
            "comparison".parse::<NodeKind>(),
            Err(Error::UnknownNodeType(tag)) if tag == "comparison"
        ));
    }

    #[test]
    fn every_operator_tag_round_trips() {
        for op in OperatorKind::ALL {
            let kind: NodeKind = op.tag().parse().unwrap();
            assert_eq!(kind, NodeKind::Operator(op));
        }
    }

    #[test]
    fn operator_arity() {
        assert_eq!(OperatorKind::Negation.arity(), 1);
        assert_eq!(OperatorKind::Not.arity(), 1);
        assert_eq!(OperatorKind::Less.arity(), 2);
        assert_eq!(OperatorKind::MultiplyAdd.arity(), 3);
        assert!(OperatorKind::Or.is_logical());
        assert!(!OperatorKind::Equal.is_logical());
    }

    #[test]
    fn metadata_management() {
        let mut node = Node::float("time", 0.5);
        assert_eq!(node.kind(), NodeKind::Float);
        assert_eq!(node.metadata("value"), Some("0.5"));

        node.set_metadata("value", "2");
        assert_eq!(node.metadata("value"), Some("2"));
        assert_eq!(node.metadata("missing"), None);
        assert_eq!(node.metadata_entries().count(), 1);
    }
}
