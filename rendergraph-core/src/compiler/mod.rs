//! Graph Compiler
//!
//! Turns a [`Graph`] into an executable [`Instance`].
//!
//! # Overview
//!
//! Compilation is a one-shot, side-effect-free pass over the graph:
//!
//! 1. Classify nodes by kind
//! 2. Schedule backward from the `present` node, rejecting cycles
//! 3. Resolve the final node feeding `present`
//! 4. Allocate value slots: floats, then operators, then pass output ports
//! 5. Allocate texture slots, skipping the node aliased to an external
//!    default framebuffer
//! 6. Create one operation and at most one framebuffer per pass node
//! 7. Emit bytecode in evaluation order, then `HALT`
//! 8. Initialize the operations
//!
//! Any failure aborts the whole compilation; no partial instance exists.
//!
//! # Design Decisions
//!
//! - **Symbol table**: nodes map to dense slot handles once, up front. Emission
//!   and execution never hash node names.
//! - **Shared registry**: the [`OperationRegistry`] sits behind an `Arc` so
//!   several compilers (or threads) can share one set of factories.

mod emit;
mod symbols;

pub use emit::MODE_KEY;
pub use symbols::SymbolTable;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, NodeKind, Scheduler};
use crate::instance::{DefaultFramebuffer, Instance, InstanceParts, OperationSlot};
use crate::operation::OperationRegistry;
use crate::resource::{Framebuffer, NativeHandle, Texture, TextureFormat};
use crate::vm::{Machine, NumericMode, Signature, Value};

/// Metadata key holding a float node's value.
pub const VALUE_KEY: &str = "value";

/// Metadata key holding a texture node's format.
pub const FORMAT_KEY: &str = "format";

/// Metadata key naming the operation type of a pass node.
pub const SUBTYPE_KEY: &str = "subtype";

/// Where the final output of the graph is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FramebufferMode {
    /// A host-owned surface, such as a window. The final texture node is
    /// aliased to `handle` and gets no texture slot.
    External { handle: NativeHandle },

    /// The instance owns the default framebuffer: whichever pass framebuffer
    /// renders the final node.
    Internal,
}

impl Default for FramebufferMode {
    fn default() -> Self {
        Self::External {
            handle: NativeHandle::NULL,
        }
    }
}

/// Compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub framebuffer: FramebufferMode,

    /// Maximum operand stack depth of the compiled instance.
    pub stack_limit: usize,

    /// Numeric mode for operator nodes without a `mode` metadata key.
    pub default_mode: NumericMode,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            framebuffer: FramebufferMode::default(),
            stack_limit: 1024,
            default_mode: NumericMode::Float,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn external(handle: NativeHandle) -> Self {
        Self {
            framebuffer: FramebufferMode::External { handle },
            ..Self::default()
        }
    }

    pub fn internal() -> Self {
        Self {
            framebuffer: FramebufferMode::Internal,
            ..Self::default()
        }
    }
}

/// Nodes grouped by kind, each group in insertion order.
#[derive(Default)]
struct Classes {
    present: Option<NodeId>,
    textures: Vec<NodeId>,
    floats: Vec<NodeId>,
    passes: Vec<NodeId>,
    operators: Vec<NodeId>,
}

impl Classes {
    fn of(graph: &Graph) -> Result<Self> {
        let mut classes = Self::default();
        for (id, node) in graph.nodes() {
            match node.kind() {
                NodeKind::Present => {
                    if classes.present.replace(id).is_some() {
                        return Err(Error::DuplicatePresentNode);
                    }
                }
                NodeKind::Texture => classes.textures.push(id),
                NodeKind::Float => classes.floats.push(id),
                NodeKind::Pass => classes.passes.push(id),
                NodeKind::Operator(_) => classes.operators.push(id),
            }
        }
        Ok(classes)
    }
}

/// Compiles graphs against a shared operation registry.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<OperationRegistry>,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(registry: Arc<OperationRegistry>) -> Self {
        Self::with_config(registry, CompilerConfig::default())
    }

    pub fn with_config(registry: Arc<OperationRegistry>, config: CompilerConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Compile `graph` into an instance.
    #[tracing::instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
    pub fn compile(&self, graph: &Graph) -> Result<Instance> {
        let classes = Classes::of(graph)?;
        tracing::debug!(
            textures = classes.textures.len(),
            floats = classes.floats.len(),
            passes = classes.passes.len(),
            operators = classes.operators.len(),
            "classified nodes"
        );

        let present = classes
            .present
            .ok_or_else(|| Error::InvalidPresentNode("graph has no present node".to_string()))?;
        let schedule = Scheduler::new(graph).schedule(present)?;
        let final_node = schedule.final_node();
        let final_kind = graph.node(final_node).kind();

        let external = match self.config.framebuffer {
            FramebufferMode::External { handle } => Some(handle),
            FramebufferMode::Internal => None,
        };
        let aliased = (external.is_some() && final_kind == NodeKind::Texture).then_some(final_node);

        let mut symbols = SymbolTable::new(graph);

        // Value memory: floats, operators, pass outputs.
        let mut values = Vec::new();
        for &node in &classes.floats {
            symbols.allocate_values(node, 1)?;
            values.push(float_value(graph, node)?);
        }
        for &node in &classes.operators {
            symbols.allocate_values(node, 1)?;
            values.push(Value::ZERO);
        }
        let mut pass_outputs = Vec::with_capacity(classes.passes.len());
        for &node in &classes.passes {
            let ports = emit::output_ports(graph, node)?;
            symbols.allocate_values(node, ports)?;
            values.resize(values.len() + ports, Value::ZERO);
            pass_outputs.push(ports);
        }

        // Texture memory.
        let mut textures = Vec::with_capacity(classes.textures.len());
        for &node in &classes.textures {
            if Some(node) == aliased {
                continue;
            }
            let format: TextureFormat = graph
                .node(node)
                .metadata(FORMAT_KEY)
                .unwrap_or_default()
                .parse()?;
            symbols.allocate_texture(node)?;
            textures.push(Texture::new(format));
        }
        tracing::debug!(
            values = values.len(),
            textures = textures.len(),
            "allocated slots"
        );

        // Operations and framebuffers, one per pass. Operations are initialized
        // only once nothing else can fail.
        let mut operations = Vec::with_capacity(classes.passes.len());
        let mut framebuffers = Vec::new();
        for (&node, &outputs) in classes.passes.iter().zip(&pass_outputs) {
            let name = graph.node(node).id();
            let subtype = graph.node(node).metadata(SUBTYPE_KEY).unwrap_or_default();

            let operation = self.registry.create(subtype)?;

            let writes_default = external.is_some()
                && (node == final_node
                    || (final_kind == NodeKind::Texture && graph.has_edge(node, final_node)));
            let framebuffer = if writes_default {
                if graph.edges_from(node).count() != 1 {
                    return Err(Error::DefaultFramebufferConflict {
                        pass: name.to_string(),
                    });
                }
                None
            } else {
                let mut slots: SmallVec<[usize; 4]> = SmallVec::new();
                for (_, edge) in graph.edges_from(node) {
                    if let Some(slot) = symbols.texture_of(edge.target()) {
                        if !slots.contains(&slot) {
                            slots.push(slot);
                        }
                    }
                }
                (!slots.is_empty()).then(|| {
                    framebuffers.push(Framebuffer::new(slots));
                    framebuffers.len() - 1
                })
            };

            symbols.allocate_operation(node)?;
            operations.push(OperationSlot {
                node: name.to_string(),
                operation,
                signature: Signature {
                    inputs: graph.edges_to(node).count(),
                    outputs,
                },
                framebuffer,
            });
        }

        let default_framebuffer = match external {
            Some(handle) => DefaultFramebuffer::External(handle),
            None => match internal_default(&symbols, &operations, &framebuffers, final_node) {
                Some(index) => DefaultFramebuffer::Internal(index),
                None => DefaultFramebuffer::Unbound,
            },
        };

        let program = emit::Emitter::new(graph, &symbols, self.config.default_mode).emit(&schedule)?;
        tracing::debug!(
            bytes = program.len(),
            operations = operations.len(),
            framebuffers = framebuffers.len(),
            "emitted program"
        );

        initialize(&mut operations)?;

        Ok(Instance::from_parts(InstanceParts {
            program,
            values,
            textures,
            operations,
            framebuffers,
            default_framebuffer,
            symbols,
            machine: Machine::new(self.config.stack_limit),
        }))
    }
}

fn float_value(graph: &Graph, node: NodeId) -> Result<Value> {
    let raw = graph.node(node).metadata(VALUE_KEY);
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .map(Value::from_float)
        .ok_or_else(|| Error::InvalidMetadata {
            node: graph.node(node).id().to_string(),
            key: VALUE_KEY.to_string(),
            value: raw.unwrap_or_default().to_string(),
        })
}

/// Framebuffer that renders the final node in internal mode, if any pass does.
fn internal_default(
    symbols: &SymbolTable,
    operations: &[OperationSlot],
    framebuffers: &[Framebuffer],
    final_node: NodeId,
) -> Option<usize> {
    match symbols.texture_of(final_node) {
        Some(slot) => framebuffers
            .iter()
            .position(|framebuffer| framebuffer.textures().contains(&slot)),
        None => symbols
            .operation_of(final_node)
            .and_then(|index| operations.get(index))
            .and_then(|slot| slot.framebuffer),
    }
}

/// Initialize every operation in order. On failure, operations already
/// initialized are released again.
fn initialize(operations: &mut [OperationSlot]) -> Result<()> {
    for index in 0..operations.len() {
        if operations[index].operation.init() {
            continue;
        }
        for slot in &mut operations[..index] {
            slot.operation.release();
        }
        return Err(Error::OperationInitFailed(operations[index].node.clone()));
    }
    Ok(())
}
