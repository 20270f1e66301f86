//! Bytecode Virtual Machine
//!
//! # Overview
//!
//! A compiled render graph is a flat byte stream executed by a small stack
//! machine. The machine reads two memories:
//!
//! - **value memory**: 32-bit [`Value`] cells for constants and operation outputs
//! - **texture memory**: texture slots, read-only; pushing one yields its native handle
//!
//! and calls into an operation table with `CALL`.
//!
//! # Design Decisions
//!
//! - **Untyped cells**: a value is 4 raw bytes; the instruction's
//!   [`NumericMode`] decides how they are read.
//! - **Context trait**: the machine does not own memories or operations. The
//!   [`ExecutionContext`] seam keeps it testable with plain tables.
//! - **Typed traps**: malformed bytecode and stack faults surface as
//!   [`Trap`](crate::error::Trap), never as panics.

mod isa;
mod machine;
mod parameters;
mod program;
mod value;

pub use isa::{Address, Instruction, NumericMode, OpCode};
pub use machine::{ExecutionContext, Exit, Machine, MachineState, Signature};
pub use parameters::Parameters;
pub use program::{Assembler, Instructions, Program};
pub use value::Value;
