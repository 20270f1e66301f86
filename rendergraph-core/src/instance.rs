//! Compiled Instances
//!
//! An [`Instance`] is the executable unit produced by the
//! [`Compiler`](crate::Compiler): bytecode plus the value, texture, operation
//! and framebuffer tables it addresses.
//!
//! # Lifecycle
//!
//! 1. `resize` provisions native storage for every texture and framebuffer and
//!    binds each operation to its render target
//! 2. `execute` runs the program once per frame
//! 3. `set_constant` patches value slots between frames
//! 4. `release` frees native objects and releases operations
//!
//! The instance is not internally synchronized. `execute` runs to completion
//! before returning and must not be re-entered.

use std::ops::Range;

use crate::compiler::SymbolTable;
use crate::error::{Error, Result};
use crate::operation::{Operation, RenderTarget};
use crate::resource::{Device, Framebuffer, NativeHandle, Texture};
use crate::vm::{ExecutionContext, Exit, Machine, Parameters, Program, Signature, Value};

/// One pass node's operation.
pub(crate) struct OperationSlot {
    pub(crate) node: String,
    pub(crate) operation: Box<dyn Operation>,
    pub(crate) signature: Signature,
    /// Index into the framebuffer table; `None` draws into the default framebuffer.
    pub(crate) framebuffer: Option<usize>,
}

/// The target backing the `present` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultFramebuffer {
    /// Supplied by the host.
    External(NativeHandle),
    /// Owned by the instance; index into its framebuffer table.
    Internal(usize),
    /// Internal mode where no pass renders the final node.
    Unbound,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The program ran to `HALT`.
    Completed,
    /// An operation stopped the frame. Effects applied before the stop are kept.
    Aborted { operation: usize },
}

/// Everything the compiler hands over.
pub(crate) struct InstanceParts {
    pub(crate) program: Program,
    pub(crate) values: Vec<Value>,
    pub(crate) textures: Vec<Texture>,
    pub(crate) operations: Vec<OperationSlot>,
    pub(crate) framebuffers: Vec<Framebuffer>,
    pub(crate) default_framebuffer: DefaultFramebuffer,
    pub(crate) symbols: SymbolTable,
    pub(crate) machine: Machine,
}

/// Tables reached by the machine during `execute`.
struct Memory {
    values: Vec<Value>,
    textures: Vec<Texture>,
    operations: Vec<OperationSlot>,
}

impl ExecutionContext for Memory {
    fn load(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    fn store(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn texture(&self, index: usize) -> Option<Value> {
        let texture = self.textures.get(index)?;
        let handle = texture.handle().unwrap_or(NativeHandle::NULL);
        Some(Value::from_uint(handle.raw()))
    }

    fn signature(&self, index: usize) -> Option<Signature> {
        self.operations.get(index).map(|slot| slot.signature)
    }

    fn call(&mut self, index: usize, parameters: &mut Parameters<'_>) -> bool {
        match self.operations.get_mut(index) {
            Some(slot) => {
                tracing::trace!(operation = index, node = %slot.node, "call");
                slot.operation.execute(parameters)
            }
            None => false,
        }
    }
}

/// A compiled, executable render graph.
pub struct Instance {
    program: Program,
    memory: Memory,
    framebuffers: Vec<Framebuffer>,
    default_framebuffer: DefaultFramebuffer,
    symbols: SymbolTable,
    machine: Machine,
    size: Option<(u32, u32)>,
}

impl Instance {
    pub(crate) fn from_parts(parts: InstanceParts) -> Self {
        Self {
            program: parts.program,
            memory: Memory {
                values: parts.values,
                textures: parts.textures,
                operations: parts.operations,
            },
            framebuffers: parts.framebuffers,
            default_framebuffer: parts.default_framebuffer,
            symbols: parts.symbols,
            machine: parts.machine,
            size: None,
        }
    }

    /// Run the program once.
    ///
    /// A trap is returned as [`Error::VmTrap`]; an operation returning false
    /// yields [`ExecutionStatus::Aborted`] and leaves the instance usable.
    pub fn execute(&mut self) -> Result<ExecutionStatus> {
        match self.machine.run(&self.program, &mut self.memory)? {
            Exit::Halted => Ok(ExecutionStatus::Completed),
            Exit::Aborted { operation, at } => {
                tracing::warn!(
                    operation,
                    at,
                    node = self.operation_node(operation).unwrap_or_default(),
                    "frame aborted"
                );
                Ok(ExecutionStatus::Aborted { operation })
            }
        }
    }

    /// Re-provision every texture and framebuffer at `width` x `height` and
    /// rebind every operation's render target.
    ///
    /// Bytecode and slot counts are untouched.
    pub fn resize(&mut self, device: &mut dyn Device, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }

        for texture in &mut self.memory.textures {
            texture.resize(device, width, height)?;
        }
        for framebuffer in &mut self.framebuffers {
            framebuffer.resize(device, &self.memory.textures, width, height)?;
        }

        let default = self.default_framebuffer();
        for slot in &mut self.memory.operations {
            let framebuffer = slot
                .framebuffer
                .and_then(|index| self.framebuffers.get(index))
                .and_then(Framebuffer::handle)
                .unwrap_or(default);
            slot.operation.set_framebuffer(RenderTarget {
                framebuffer,
                width,
                height,
            });
        }

        self.size = Some((width, height));
        tracing::debug!(
            width,
            height,
            textures = self.memory.textures.len(),
            framebuffers = self.framebuffers.len(),
            "resized"
        );
        Ok(())
    }

    /// Overwrite value slot `index`. Visible to the next `execute`.
    pub fn set_constant(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let slot = self
            .memory
            .values
            .get_mut(index)
            .ok_or(Error::InvalidSlot(index))?;
        *slot = value.into();
        Ok(())
    }

    pub fn value(&self, index: usize) -> Option<Value> {
        self.memory.values.get(index).copied()
    }

    /// First value slot of the node named `id`.
    pub fn value_slot(&self, id: &str) -> Option<usize> {
        self.symbols.value_slot(id)
    }

    /// All value slots of the node named `id`, one per output port for passes.
    pub fn value_slots(&self, id: &str) -> Option<Range<usize>> {
        self.symbols.value_slots(id)
    }

    /// Native handle of texture slot `index`, once sized.
    pub fn render_texture(&self, index: usize) -> Option<NativeHandle> {
        self.memory.textures.get(index)?.handle()
    }

    /// Native handle of the framebuffer backing `present`.
    ///
    /// [`NativeHandle::NULL`] for an internal default framebuffer before the
    /// first resize, and when no pass renders the final node.
    pub fn default_framebuffer(&self) -> NativeHandle {
        match self.default_framebuffer {
            DefaultFramebuffer::External(handle) => handle,
            DefaultFramebuffer::Internal(index) => self
                .framebuffers
                .get(index)
                .and_then(Framebuffer::handle)
                .unwrap_or(NativeHandle::NULL),
            DefaultFramebuffer::Unbound => NativeHandle::NULL,
        }
    }

    pub fn default_framebuffer_kind(&self) -> DefaultFramebuffer {
        self.default_framebuffer
    }

    /// Free every native object and release every operation.
    pub fn release(mut self, device: &mut dyn Device) {
        for framebuffer in &mut self.framebuffers {
            framebuffer.release(device);
        }
        for texture in &mut self.memory.textures {
            texture.release(device);
        }
        for slot in &mut self.memory.operations {
            slot.operation.release();
        }
        tracing::debug!("released");
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Node identifier of operation `index`.
    pub fn operation_node(&self, index: usize) -> Option<&str> {
        self.memory.operations.get(index).map(|slot| slot.node.as_str())
    }

    /// Size of the last successful resize.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    pub fn value_count(&self) -> usize {
        self.memory.values.len()
    }

    pub fn texture_count(&self) -> usize {
        self.memory.textures.len()
    }

    pub fn operation_count(&self) -> usize {
        self.memory.operations.len()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("program_len", &self.program.len())
            .field("values", &self.memory.values.len())
            .field("textures", &self.memory.textures.len())
            .field("operations", &self.memory.operations.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("default_framebuffer", &self.default_framebuffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{Graph, Node, OperatorKind};
    use crate::operation::OperationRegistry;
    use crate::resource::HeadlessDevice;
    use crate::{Compiler, CompilerConfig};

    fn arithmetic() -> Instance {
        // (a + b) * c, staged through a pass that forwards its input.
        let mut graph = Graph::new();
        graph.add_node(Node::float("a", 2.0)).unwrap();
        graph.add_node(Node::float("b", 3.0)).unwrap();
        graph.add_node(Node::float("c", 4.0)).unwrap();
        graph
            .add_node(Node::operator("sum", OperatorKind::Addition))
            .unwrap();
        graph
            .add_node(Node::operator("product", OperatorKind::Multiplication))
            .unwrap();
        graph.add_node(Node::pass("out", "sink")).unwrap();
        graph.add_node(Node::present("present")).unwrap();
        graph.connect("a", 0, "sum", 0).unwrap();
        graph.connect("b", 0, "sum", 1).unwrap();
        graph.connect("sum", 0, "product", 0).unwrap();
        graph.connect("c", 0, "product", 1).unwrap();
        graph.connect("product", 0, "out", 0).unwrap();
        graph.connect("out", 0, "present", 0).unwrap();

        struct Forward;
        impl Operation for Forward {
            fn execute(&mut self, parameters: &mut Parameters<'_>) -> bool {
                match parameters.pop() {
                    Some(value) => {
                        parameters.push(value);
                        true
                    }
                    None => false,
                }
            }
        }

        let registry = OperationRegistry::new();
        registry
            .register("sink", || Box::new(Forward) as Box<dyn Operation>)
            .unwrap();
        Compiler::with_config(Arc::new(registry), CompilerConfig::default())
            .compile(&graph)
            .unwrap()
    }

    #[test]
    fn execute_and_patch_constants() {
        let mut instance = arithmetic();
        assert_eq!(instance.execute().unwrap(), ExecutionStatus::Completed);

        let product = instance.value_slot("product").unwrap();
        assert_eq!(instance.value(product).unwrap().as_float(), 20.0);
        let out = instance.value_slot("out").unwrap();
        assert_eq!(instance.value(out).unwrap().as_float(), 20.0);

        let c = instance.value_slot("c").unwrap();
        instance.set_constant(c, 10.0f32).unwrap();
        instance.execute().unwrap();
        assert_eq!(instance.value(product).unwrap().as_float(), 50.0);
    }

    #[test]
    fn set_constant_rejects_bad_slots() {
        let mut instance = arithmetic();
        let count = instance.value_count();
        assert!(matches!(
            instance.set_constant(count, 1u32),
            Err(Error::InvalidSlot(i)) if i == count
        ));
    }

    #[test]
    fn resize_rejects_zero() {
        let mut instance = arithmetic();
        let mut device = HeadlessDevice::new();
        assert!(matches!(
            instance.resize(&mut device, 0, 10),
            Err(Error::InvalidDimensions { width: 0, height: 10 })
        ));
        assert_eq!(instance.size(), None);

        instance.resize(&mut device, 8, 8).unwrap();
        assert_eq!(instance.size(), Some((8, 8)));
        instance.release(&mut device);
        assert_eq!(device.live_textures(), 0);
    }
}
