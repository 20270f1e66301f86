//! Render Graph Core
//!
//! This crate compiles declarative per-frame rendering pipelines into compact
//! bytecode and replays them on a small stack-based virtual machine.
//! It implements:
//!
//! - A typed render graph of constants, operators, passes, textures and a
//!   single `present` sink
//! - Backward topological scheduling with cycle detection
//! - A compiler that allocates value/texture slots and emits bytecode
//! - The virtual machine and the instance that owns its tables
//!
//! Native graphics work stays outside: textures and framebuffers are created
//! through the [`Device`] trait, and the actual drawing is done by
//! [`Operation`]s the application registers.
//!
//! # Architecture
//!
//! - `graph`: nodes, edges, the graph arena, the JSON loader and the scheduler
//! - `compiler`: classification, slot allocation and instruction selection
//! - `vm`: instruction set, programs and the interpreter
//! - `instance`: the compiled, executable unit
//! - `operation`: the `Operation`/`Pass` traits and the registry
//! - `resource`: texture formats, textures, framebuffers and devices
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rendergraph_core::{
//!     Compiler, Graph, HeadlessDevice, Node, OperationRegistry, Parameters, Pass,
//!     RenderTarget, Value,
//! };
//!
//! struct Scene;
//!
//! impl Pass for Scene {
//!     fn render(&mut self, _target: &RenderTarget, parameters: &mut Parameters<'_>) -> bool {
//!         let time = parameters.pop().map_or(0.0, Value::as_float);
//!         parameters.push(Value::from_float(time));
//!         true
//!     }
//! }
//!
//! let registry = OperationRegistry::new();
//! registry.register_pass("scene", || Scene).unwrap();
//!
//! let mut graph = Graph::new();
//! graph.add_node(Node::float("time", 0.0)).unwrap();
//! graph.add_node(Node::pass("draw", "scene")).unwrap();
//! graph.add_node(Node::texture("color", "RGBA8")).unwrap();
//! graph.add_node(Node::present("present")).unwrap();
//! graph.connect("time", 0, "draw", 0).unwrap();
//! graph.connect("draw", 0, "color", 0).unwrap();
//! graph.connect("color", 0, "present", 0).unwrap();
//!
//! let mut instance = Compiler::new(Arc::new(registry)).compile(&graph).unwrap();
//! let mut device = HeadlessDevice::new();
//! instance.resize(&mut device, 1280, 720).unwrap();
//!
//! let time = instance.value_slot("time").unwrap();
//! instance.set_constant(time, 0.016f32).unwrap();
//! instance.execute().unwrap();
//! ```

pub mod compiler;
pub mod error;
pub mod graph;
pub mod instance;
pub mod operation;
pub mod resource;
pub mod vm;

pub use compiler::{Compiler, CompilerConfig, FramebufferMode, SymbolTable};
pub use error::{Error, Result, Trap};
pub use graph::{Edge, EdgeId, Graph, Node, NodeId, NodeKind, OperatorKind, Schedule, Scheduler};
pub use instance::{DefaultFramebuffer, ExecutionStatus, Instance};
pub use operation::{Operation, OperationRegistry, Pass, PassOperation, RenderTarget};
pub use resource::{Device, HeadlessDevice, NativeHandle, Texture, TextureFormat};
pub use vm::{Parameters, Program, Value};
