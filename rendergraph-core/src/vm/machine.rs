//! Bytecode interpreter
//!
//! Stack-based fetch/decode/execute loop. The machine owns only its
//! instruction pointer and operand stack; value memory, texture memory and
//! operations are reached through an [`ExecutionContext`].

use super::isa::{Instruction, NumericMode, OpCode};
use super::parameters::{InputBuffer, Parameters};
use super::program::Program;
use super::value::Value;
use crate::error::Trap;

/// Declared stack effect of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Values moved off the stack before the call.
    pub inputs: usize,
    /// Values the operation must push.
    pub outputs: usize,
}

/// Tables the machine reads and writes while executing.
pub trait ExecutionContext {
    /// Read a value-memory slot.
    fn load(&self, index: usize) -> Option<Value>;

    /// Write a value-memory slot. Returns false if the slot does not exist.
    fn store(&mut self, index: usize, value: Value) -> bool;

    /// Native handle of a texture slot, as a value.
    fn texture(&self, index: usize) -> Option<Value>;

    /// Stack effect of operation `index`, if it exists.
    fn signature(&self, index: usize) -> Option<Signature>;

    /// Run operation `index`. Returning false stops the program.
    fn call(&mut self, index: usize, parameters: &mut Parameters<'_>) -> bool;
}

/// Whether the machine is inside a `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A `HALT` was reached with an empty stack.
    Halted,
    /// Operation `operation`, called at byte offset `at`, signalled stop.
    Aborted { operation: usize, at: usize },
}

/// The virtual machine.
#[derive(Debug)]
pub struct Machine {
    ip: usize,
    stack: Vec<Value>,
    scratch: InputBuffer,
    state: MachineState,
    stack_limit: usize,
}

impl Machine {
    pub fn new(stack_limit: usize) -> Self {
        Self {
            ip: 0,
            stack: Vec::with_capacity(stack_limit.min(64)),
            scratch: InputBuffer::new(),
            state: MachineState::Halted,
            stack_limit,
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Current operand stack depth.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Byte offset of the next instruction.
    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Execute `program` from its first byte until `HALT`, a stop signal, or a trap.
    ///
    /// The stack is always empty afterwards. Effects already applied before a
    /// stop or trap stay applied.
    pub fn run(
        &mut self,
        program: &Program,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<Exit, Trap> {
        self.ip = 0;
        self.stack.clear();

        if program.is_empty() {
            return Ok(Exit::Halted);
        }

        self.state = MachineState::Running;
        let outcome = self.dispatch(program.as_bytes(), ctx);
        self.state = MachineState::Halted;
        self.stack.clear();
        outcome
    }

    fn dispatch(&mut self, bytes: &[u8], ctx: &mut dyn ExecutionContext) -> Result<Exit, Trap> {
        loop {
            let at = self.ip;
            let (instruction, next) = Instruction::decode(bytes, at)?;
            self.ip = next;

            match instruction {
                Instruction::Nop => {}

                Instruction::Push(addr) => {
                    let value = if addr.is_texture() {
                        ctx.texture(addr.index())
                            .ok_or(Trap::TextureAddressOutOfRange {
                                at,
                                index: addr.index(),
                            })?
                    } else {
                        ctx.load(addr.index())
                            .ok_or(Trap::ValueAddressOutOfRange {
                                at,
                                index: addr.index(),
                            })?
                    };
                    self.push(value, at)?;
                }

                Instruction::Pop(addr) => {
                    if addr.is_texture() {
                        return Err(Trap::TexturePop { at });
                    }
                    let value = self.pop(at)?;
                    if !ctx.store(addr.index(), value) {
                        return Err(Trap::ValueAddressOutOfRange {
                            at,
                            index: addr.index(),
                        });
                    }
                }

                Instruction::Add(mode)
                | Instruction::Sub(mode)
                | Instruction::Mul(mode)
                | Instruction::Div(mode) => {
                    let b = self.pop(at)?;
                    let a = self.pop(at)?;
                    let result = arithmetic(instruction.opcode(), mode, a, b, at)?;
                    self.push(result, at)?;
                }

                Instruction::Neg(mode) => {
                    let a = self.pop(at)?;
                    let result = match mode {
                        NumericMode::Uint => Value::from_uint(a.as_uint().wrapping_neg()),
                        NumericMode::Int => Value::from_int(a.as_int().wrapping_neg()),
                        NumericMode::Float => Value::from_float(-a.as_float()),
                    };
                    self.push(result, at)?;
                }

                Instruction::Abs(mode) => {
                    let a = self.pop(at)?;
                    let result = match mode {
                        NumericMode::Uint => a,
                        NumericMode::Int => Value::from_int(a.as_int().wrapping_abs()),
                        NumericMode::Float => Value::from_float(a.as_float().abs()),
                    };
                    self.push(result, at)?;
                }

                Instruction::Fma(mode) => {
                    let c = self.pop(at)?;
                    let b = self.pop(at)?;
                    let a = self.pop(at)?;
                    let result = match mode {
                        NumericMode::Uint => Value::from_uint(
                            a.as_uint().wrapping_add(b.as_uint().wrapping_mul(c.as_uint())),
                        ),
                        NumericMode::Int => Value::from_int(
                            a.as_int().wrapping_add(b.as_int().wrapping_mul(c.as_int())),
                        ),
                        NumericMode::Float => {
                            Value::from_float(b.as_float().mul_add(c.as_float(), a.as_float()))
                        }
                    };
                    self.push(result, at)?;
                }

                Instruction::Eq(mode)
                | Instruction::Neq(mode)
                | Instruction::Gt(mode)
                | Instruction::Gte(mode)
                | Instruction::Lt(mode)
                | Instruction::Lte(mode) => {
                    let b = self.pop(at)?;
                    let a = self.pop(at)?;
                    let op = instruction.opcode();
                    let result = match mode {
                        NumericMode::Uint => compare(op, a.as_uint(), b.as_uint()),
                        NumericMode::Int => compare(op, a.as_int(), b.as_int()),
                        NumericMode::Float => compare(op, a.as_float(), b.as_float()),
                    };
                    self.push(Value::from_bool(result), at)?;
                }

                Instruction::Not => {
                    let a = self.pop(at)?;
                    self.push(Value::from_bool(!a.as_bool()), at)?;
                }

                Instruction::And | Instruction::Or => {
                    let b = self.pop(at)?.as_bool();
                    let a = self.pop(at)?.as_bool();
                    let result = if instruction == Instruction::And {
                        a && b
                    } else {
                        a || b
                    };
                    self.push(Value::from_bool(result), at)?;
                }

                Instruction::Jmp(target) => {
                    self.ip = target as usize;
                }

                Instruction::Jmpt(target) => {
                    if self.pop(at)?.as_bool() {
                        self.ip = target as usize;
                    }
                }

                Instruction::Jmpf(target) => {
                    if !self.pop(at)?.as_bool() {
                        self.ip = target as usize;
                    }
                }

                Instruction::Call(index) => {
                    let index = index as usize;
                    if let Some(exit) = self.call(index, at, ctx)? {
                        return Ok(exit);
                    }
                }

                Instruction::Halt => {
                    if !self.stack.is_empty() {
                        return Err(Trap::UnbalancedStack {
                            at,
                            depth: self.stack.len(),
                        });
                    }
                    return Ok(Exit::Halted);
                }
            }
        }
    }

    fn call(
        &mut self,
        index: usize,
        at: usize,
        ctx: &mut dyn ExecutionContext,
    ) -> Result<Option<Exit>, Trap> {
        let signature = ctx
            .signature(index)
            .ok_or(Trap::UnknownOperation { at, index })?;

        let depth = self.stack.len();
        if depth < signature.inputs {
            return Err(Trap::StackUnderflow { at });
        }

        self.scratch.clear();
        self.scratch
            .extend(self.stack.drain(depth - signature.inputs..));

        let mut parameters = Parameters::new(&mut self.scratch, &mut self.stack);
        let proceed = ctx.call(index, &mut parameters);
        let pushed = parameters.pushed();

        if !proceed {
            tracing::warn!(operation = index, at, "operation stopped the program");
            return Ok(Some(Exit::Aborted {
                operation: index,
                at,
            }));
        }
        if pushed != signature.outputs {
            return Err(Trap::OutputCountMismatch {
                at,
                index,
                expected: signature.outputs,
                found: pushed,
            });
        }
        if self.stack.len() > self.stack_limit {
            return Err(Trap::StackOverflow {
                at,
                limit: self.stack_limit,
            });
        }
        Ok(None)
    }

    fn push(&mut self, value: Value, at: usize) -> Result<(), Trap> {
        if self.stack.len() >= self.stack_limit {
            return Err(Trap::StackOverflow {
                at,
                limit: self.stack_limit,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, at: usize) -> Result<Value, Trap> {
        self.stack.pop().ok_or(Trap::StackUnderflow { at })
    }
}

fn arithmetic(op: OpCode, mode: NumericMode, a: Value, b: Value, at: usize) -> Result<Value, Trap> {
    let result = match mode {
        NumericMode::Uint => {
            let (a, b) = (a.as_uint(), b.as_uint());
            Value::from_uint(match op {
                OpCode::Add => a.wrapping_add(b),
                OpCode::Sub => a.wrapping_sub(b),
                OpCode::Mul => a.wrapping_mul(b),
                _ => a.checked_div(b).ok_or(Trap::DivisionByZero { at })?,
            })
        }
        NumericMode::Int => {
            let (a, b) = (a.as_int(), b.as_int());
            Value::from_int(match op {
                OpCode::Add => a.wrapping_add(b),
                OpCode::Sub => a.wrapping_sub(b),
                OpCode::Mul => a.wrapping_mul(b),
                _ if b == 0 => return Err(Trap::DivisionByZero { at }),
                _ => a.wrapping_div(b),
            })
        }
        NumericMode::Float => {
            let (a, b) = (a.as_float(), b.as_float());
            Value::from_float(match op {
                OpCode::Add => a + b,
                OpCode::Sub => a - b,
                OpCode::Mul => a * b,
                _ => a / b,
            })
        }
    };
    Ok(result)
}

fn compare<T: PartialOrd>(op: OpCode, a: T, b: T) -> bool {
    match op {
        OpCode::Eq => a == b,
        OpCode::Neq => a != b,
        OpCode::Gt => a > b,
        OpCode::Gte => a >= b,
        OpCode::Lt => a < b,
        _ => a <= b,
    }
}
