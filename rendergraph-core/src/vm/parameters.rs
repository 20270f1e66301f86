//! The operand view handed to operations by `CALL`.

use smallvec::SmallVec;

use super::value::Value;

/// Inputs moved off the operand stack for one `CALL`.
pub(crate) type InputBuffer = SmallVec<[Value; 8]>;

/// LIFO view over the VM operand stack for the duration of one operation call.
///
/// `pop` yields the operation's inputs, last input port first. `push` writes
/// outputs back onto the operand stack; the compiler pops them into value
/// memory in reverse port order, so outputs must be pushed in port order.
pub struct Parameters<'a> {
    inputs: &'a mut InputBuffer,
    stack: &'a mut Vec<Value>,
    pushed: usize,
}

impl<'a> Parameters<'a> {
    pub(crate) fn new(inputs: &'a mut InputBuffer, stack: &'a mut Vec<Value>) -> Self {
        Self {
            inputs,
            stack,
            pushed: 0,
        }
    }

    /// Pop the next input. `None` once all declared inputs are consumed.
    pub fn pop(&mut self) -> Option<Value> {
        self.inputs.pop()
    }

    /// Push an output.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
        self.pushed += 1;
    }

    /// Inputs not yet popped.
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }

    pub(crate) fn pushed(&self) -> usize {
        self.pushed
    }
}
