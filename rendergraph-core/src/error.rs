//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Compile-time
//! errors are fatal: no partial [`Instance`](crate::Instance) is ever produced.
//! Run-time decode violations surface as [`Error::VmTrap`] and indicate a
//! compiler/VM contract violation rather than a recoverable condition.

use thiserror::Error;

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a graph, compiling it, or running an instance.
#[derive(Debug, Error)]
pub enum Error {
    /// An edge remained in the working copy after scheduling.
    #[error("graph contains a cycle reachable from the present node ({remaining_edges} edge(s) left unscheduled)")]
    CyclicGraph { remaining_edges: usize },

    /// The present node is missing, or does not have exactly one predecessor.
    #[error("invalid present node: {0}")]
    InvalidPresentNode(String),

    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("unknown texture format '{0}'")]
    UnknownFormat(String),

    #[error("unknown operation type '{0}'")]
    UnknownOperationType(String),

    #[error("bytecode program is empty")]
    EmptyProgram,

    #[error("vm trap: {0}")]
    VmTrap(#[from] Trap),

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("unknown node id '{0}'")]
    UnknownNode(String),

    #[error("graph already has a present node")]
    DuplicatePresentNode,

    #[error("node '{node}': invalid metadata {key}='{value}'")]
    InvalidMetadata {
        node: String,
        key: String,
        value: String,
    },

    #[error("node '{node}': expected {expected} input(s), found {found}")]
    InvalidArity {
        node: String,
        expected: usize,
        found: usize,
    },

    #[error("node '{node}': port {port} is out of range or bound twice")]
    InvalidPort { node: String, port: usize },

    /// A texture input is produced through another texture; only one hop is resolved.
    #[error("node '{node}': texture indirection deeper than one hop")]
    UnsupportedIndirection { node: String },

    #[error("node '{node}': input port {port} does not resolve to an addressable slot")]
    UnresolvedInput { node: String, port: usize },

    /// A pass rendering straight into the default framebuffer must have a single output.
    #[error("pass '{pass}' writes to the default framebuffer and must have exactly one output")]
    DefaultFramebufferConflict { pass: String },

    #[error("{space} address space exhausted")]
    AddressSpaceExhausted { space: &'static str },

    #[error("operation for node '{0}' failed to initialize")]
    OperationInitFailed(String),

    #[error("operation type '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("framebuffer incomplete: {0}")]
    IncompleteFramebuffer(String),

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("value slot {0} is out of range")]
    InvalidSlot(usize),

    #[error("graph source: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal decode/execute violations detected by the virtual machine.
///
/// `at` is the byte offset of the faulting instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("instruction pointer {at} is outside the program")]
    InstructionPointerOutOfRange { at: usize },

    #[error("instruction at {at} is truncated")]
    TruncatedInstruction { at: usize },

    #[error("invalid opcode 0x{opcode:02x} at {at}")]
    InvalidOpcode { at: usize, opcode: u8 },

    #[error("invalid numeric mode {mode} at {at}")]
    InvalidMode { at: usize, mode: u8 },

    #[error("stack underflow at {at}")]
    StackUnderflow { at: usize },

    #[error("stack overflow at {at} (limit {limit})")]
    StackOverflow { at: usize, limit: usize },

    #[error("pop into texture memory at {at}")]
    TexturePop { at: usize },

    #[error("value address {index} out of range at {at}")]
    ValueAddressOutOfRange { at: usize, index: usize },

    #[error("texture address {index} out of range at {at}")]
    TextureAddressOutOfRange { at: usize, index: usize },

    #[error("call to unknown operation {index} at {at}")]
    UnknownOperation { at: usize, index: usize },

    #[error("operation {index} pushed {found} output(s), expected {expected} (at {at})")]
    OutputCountMismatch {
        at: usize,
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("integer division by zero at {at}")]
    DivisionByZero { at: usize },

    #[error("{depth} value(s) left on the stack at halt ({at})")]
    UnbalancedStack { at: usize, depth: usize },
}
