//! Instruction selection.
//!
//! Walks the evaluation order and lowers operator and pass nodes into
//! `PUSH`/op/`POP` and `PUSH`/`CALL`/`POP` sequences.

use smallvec::SmallVec;

use super::symbols::SymbolTable;
use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, NodeId, NodeKind, OperatorKind, Schedule, SOURCE_PORT, TARGET_PORT};
use crate::vm::{Address, Assembler, Instruction, NumericMode, Program};

/// Metadata key selecting an operator's numeric mode.
pub const MODE_KEY: &str = "mode";

/// Input edges of a node, sorted by target port.
pub(crate) type Inputs<'g> = SmallVec<[&'g Edge; 4]>;

/// Collect the input edges of `node`, checking they cover ports `0..n` once each.
pub(crate) fn inputs(graph: &Graph, node: NodeId) -> Result<Inputs<'_>> {
    let mut ports: SmallVec<[(usize, &Edge); 4]> = SmallVec::new();
    for (_, edge) in graph.edges_to(node) {
        let port = edge
            .target_port()
            .map_err(|value| invalid_metadata(graph, node, TARGET_PORT, value))?;
        ports.push((port, edge));
    }
    ports.sort_by_key(|(port, _)| *port);

    for (expected, (port, _)) in ports.iter().enumerate() {
        if *port != expected {
            return Err(Error::InvalidPort {
                node: graph.node(node).id().to_string(),
                port: *port,
            });
        }
    }

    Ok(ports.into_iter().map(|(_, edge)| edge).collect())
}

/// Number of output ports of `node`: one past the highest `source_id` used.
pub(crate) fn output_ports(graph: &Graph, node: NodeId) -> Result<usize> {
    let mut count = 0;
    for (_, edge) in graph.edges_from(node) {
        let port = edge
            .source_port()
            .map_err(|value| invalid_metadata(graph, node, SOURCE_PORT, value))?;
        count = count.max(port + 1);
    }
    Ok(count)
}

fn invalid_metadata(graph: &Graph, node: NodeId, key: &str, value: &str) -> Error {
    Error::InvalidMetadata {
        node: graph.node(node).id().to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// The instruction implementing `kind` in `mode`.
pub(crate) fn operator_instruction(kind: OperatorKind, mode: NumericMode) -> Instruction {
    match kind {
        OperatorKind::Addition => Instruction::Add(mode),
        OperatorKind::Subtraction => Instruction::Sub(mode),
        OperatorKind::Multiplication => Instruction::Mul(mode),
        OperatorKind::Division => Instruction::Div(mode),
        OperatorKind::Negation => Instruction::Neg(mode),
        OperatorKind::Absolute => Instruction::Abs(mode),
        OperatorKind::MultiplyAdd => Instruction::Fma(mode),
        OperatorKind::Equal => Instruction::Eq(mode),
        OperatorKind::NotEqual => Instruction::Neq(mode),
        OperatorKind::Greater => Instruction::Gt(mode),
        OperatorKind::GreaterOrEqual => Instruction::Gte(mode),
        OperatorKind::Less => Instruction::Lt(mode),
        OperatorKind::LessOrEqual => Instruction::Lte(mode),
        OperatorKind::Not => Instruction::Not,
        OperatorKind::And => Instruction::And,
        OperatorKind::Or => Instruction::Or,
    }
}

pub(crate) struct Emitter<'a> {
    graph: &'a Graph,
    symbols: &'a SymbolTable,
    default_mode: NumericMode,
    asm: Assembler,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(graph: &'a Graph, symbols: &'a SymbolTable, default_mode: NumericMode) -> Self {
        Self {
            graph,
            symbols,
            default_mode,
            asm: Assembler::new(),
        }
    }

    /// Lower every scheduled node, source first, and terminate with `HALT`.
    pub(crate) fn emit(mut self, schedule: &Schedule) -> Result<Program> {
        for node in schedule.evaluation_order() {
            match self.graph.node(node).kind() {
                NodeKind::Operator(kind) => self.emit_operator(node, kind)?,
                NodeKind::Pass => self.emit_pass(node)?,
                NodeKind::Float | NodeKind::Texture | NodeKind::Present => {}
            }
        }
        self.asm.emit(Instruction::Halt);
        self.asm.finish()
    }

    fn emit_operator(&mut self, node: NodeId, kind: OperatorKind) -> Result<()> {
        let inputs = inputs(self.graph, node)?;
        if inputs.len() != kind.arity() {
            return Err(Error::InvalidArity {
                node: self.name(node),
                expected: kind.arity(),
                found: inputs.len(),
            });
        }

        let mode = self.mode(node)?;
        for (port, edge) in inputs.iter().enumerate() {
            let address = self.resolve(node, port, edge)?;
            self.asm.emit(Instruction::Push(address));
        }
        self.asm.emit(operator_instruction(kind, mode));

        let output = self.value_address(node, 0)?;
        self.asm.emit(Instruction::Pop(output));
        Ok(())
    }

    fn emit_pass(&mut self, node: NodeId) -> Result<()> {
        let inputs = inputs(self.graph, node)?;
        for (port, edge) in inputs.iter().enumerate() {
            let address = self.resolve(node, port, edge)?;
            self.asm.emit(Instruction::Push(address));
        }

        let operation = self
            .symbols
            .operation_of(node)
            .ok_or_else(|| Error::UnknownOperationType(self.name(node)))?;
        self.asm.emit(Instruction::Call(operation as u16));

        // Outputs come back in port order, so the last port is on top.
        let ports = self.symbols.values_of(node).len();
        for port in (0..ports).rev() {
            let output = self.value_address(node, port)?;
            self.asm.emit(Instruction::Pop(output));
        }
        Ok(())
    }

    /// Address that input `port` of `consumer` reads, following at most one
    /// texture hop back to the value producer.
    fn resolve(&self, consumer: NodeId, port: usize, edge: &Edge) -> Result<Address> {
        let source = edge.source();
        if self.graph.node(source).kind() != NodeKind::Texture {
            return self.resolve_producer(consumer, port, edge);
        }

        let mut producers = self.graph.edges_to(source).map(|(_, e)| e);
        match (producers.next(), producers.next()) {
            (None, _) => self
                .symbols
                .texture_of(source)
                .and_then(Address::texture)
                .ok_or_else(|| self.unresolved(consumer, port)),
            (Some(hop), None) => {
                if self.graph.node(hop.source()).kind() == NodeKind::Texture {
                    return Err(Error::UnsupportedIndirection {
                        node: self.name(consumer),
                    });
                }
                self.resolve_producer(consumer, port, hop)
            }
            (Some(_), Some(_)) => Err(self.unresolved(consumer, port)),
        }
    }

    /// Value slot written by the source of `edge`.
    fn resolve_producer(&self, consumer: NodeId, port: usize, edge: &Edge) -> Result<Address> {
        let source = edge.source();
        let output = edge
            .source_port()
            .map_err(|value| invalid_metadata(self.graph, source, SOURCE_PORT, value))?;

        match self.graph.node(source).kind() {
            NodeKind::Float | NodeKind::Operator(_) | NodeKind::Pass => {
                let slots = self.symbols.values_of(source);
                if output >= slots.len() {
                    return Err(Error::InvalidPort {
                        node: self.name(source),
                        port: output,
                    });
                }
                self.value_address(source, output)
            }
            NodeKind::Texture | NodeKind::Present => Err(self.unresolved(consumer, port)),
        }
    }

    fn value_address(&self, node: NodeId, port: usize) -> Result<Address> {
        self.symbols
            .values_of(node)
            .nth(port)
            .and_then(Address::value)
            .ok_or(Error::InvalidPort {
                node: self.name(node),
                port,
            })
    }

    fn mode(&self, node: NodeId) -> Result<NumericMode> {
        match self.graph.node(node).metadata(MODE_KEY) {
            None => Ok(self.default_mode),
            Some(value) => value
                .parse()
                .map_err(|_| invalid_metadata(self.graph, node, MODE_KEY, value)),
        }
    }

    fn unresolved(&self, consumer: NodeId, port: usize) -> Error {
        Error::UnresolvedInput {
            node: self.name(consumer),
            port,
        }
    }

    fn name(&self, node: NodeId) -> String {
        self.graph.node(node).id().to_string()
    }
}
