//! Bytecode programs.

use std::fmt;

use super::isa::Instruction;
use crate::error::{Error, Result, Trap};

/// An immutable, compiled byte stream.
///
/// Programs are produced once and replaced wholesale on recompilation; the
/// only mutable execution state is the VM's instruction pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    /// Wrap an encoded byte stream. Fails with [`Error::EmptyProgram`] on an empty stream.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyProgram);
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the whole stream linearly as `(offset, instruction)` pairs.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            bytes: &self.bytes,
            at: 0,
            failed: false,
        }
    }
}

/// Linear decoder over a [`Program`].
pub struct Instructions<'a> {
    bytes: &'a [u8],
    at: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = std::result::Result<(usize, Instruction), Trap>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.at >= self.bytes.len() {
            return None;
        }

        let at = self.at;
        match Instruction::decode(self.bytes, at) {
            Ok((instruction, next)) => {
                self.at = next;
                Some(Ok((at, instruction)))
            }
            Err(trap) => {
                self.failed = true;
                Some(Err(trap))
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for decoded in self.instructions() {
            match decoded {
                Ok((at, instruction)) => writeln!(f, "{at:04} {instruction}")?,
                Err(trap) => writeln!(f, "<{trap}>")?,
            }
        }
        Ok(())
    }
}

/// Incrementally encodes instructions into a [`Program`].
#[derive(Debug, Default)]
pub struct Assembler {
    bytes: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `instruction` and return its byte offset.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let at = self.bytes.len();
        instruction.encode(&mut self.bytes);
        tracing::trace!("{at:04} {instruction}");
        at
    }

    /// Offset the next instruction will be written at.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn finish(self) -> Result<Program> {
        Program::new(self.bytes)
    }
}
