//! Render Graph
//!
//! This module implements the declarative pipeline description that the
//! compiler consumes.
//!
//! # Overview
//!
//! The render graph is a directed graph where:
//!
//! - Nodes are typed: constants, operators, render passes, textures, and a
//!   single terminal `present` node
//! - Edges connect an output port of one node to an input port of another;
//!   the port indices live in the edge metadata (`source_id`, `target_id`)
//!
//! # Design Decisions
//!
//! 1. Nodes and edges live in a flat arena addressed by dense handles. The
//!    scheduler never mutates the graph; it rebuilds its own index-based
//!    working copy.
//!
//! 2. Node types are a closed enum, so the compiler matches exhaustively.
//!
//! 3. Insertion order is preserved everywhere. Slot allocation depends on it.

mod arena;
mod edge;
mod json;
mod node;
mod scheduler;

pub use arena::Graph;
pub use edge::{Edge, EdgeId, SOURCE_PORT, TARGET_PORT};
pub use node::{Node, NodeId, NodeKind, OperatorKind};
pub use scheduler::{Schedule, Scheduler};
