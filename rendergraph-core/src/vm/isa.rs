//! Instruction Set
//!
//! Defines the byte encoding shared by the compiler and the virtual machine.
//!
//! Every instruction is a one-byte opcode followed by a fixed operand layout:
//!
//! | Opcode | Operands | Stack effect |
//! |---|---|---|
//! | `NOP` | - | none |
//! | `PUSH` | 2-byte address | push value or texture handle |
//! | `POP` | 2-byte value address | pop into value memory |
//! | `ADD` `SUB` `MUL` `DIV` | mode | pop 2, push 1 |
//! | `NEG` `ABS` | mode | pop 1, push 1 |
//! | `FMA` | mode | pop 3, push `a + b * c` |
//! | `EQ` `NEQ` `GT` `GTE` `LT` `LTE` | mode | pop 2, push bool |
//! | `NOT` | - | pop 1, push bool |
//! | `AND` `OR` | - | pop 2, push bool |
//! | `JMP` `JMPT` `JMPF` | 2-byte absolute offset | `JMPT`/`JMPF` pop the condition |
//! | `CALL` | 2-byte operation index | operation-defined |
//! | `HALT` | - | stop |
//!
//! Multi-byte operands are big-endian.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Trap;

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Nop = 0x00,

    // Stack
    Push = 0x01,
    Pop = 0x02,

    // Arithmetic
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Neg = 0x14,
    Abs = 0x15,
    Fma = 0x16,

    // Comparison
    Eq = 0x20,
    Neq = 0x21,
    Gt = 0x22,
    Gte = 0x23,
    Lt = 0x24,
    Lte = 0x25,

    // Logical
    Not = 0x30,
    And = 0x31,
    Or = 0x32,

    // Branch
    Jmp = 0x40,
    Jmpt = 0x41,
    Jmpf = 0x42,

    // Functions
    Call = 0x50,
    Halt = 0xff,
}

impl OpCode {
    const ALL: [OpCode; 24] = [
        Self::Nop,
        Self::Push,
        Self::Pop,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Neg,
        Self::Abs,
        Self::Fma,
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Not,
        Self::And,
        Self::Or,
        Self::Jmp,
        Self::Jmpt,
        Self::Jmpf,
        Self::Call,
        Self::Halt,
    ];

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u8 == byte)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Neg => "NEG",
            Self::Abs => "ABS",
            Self::Fma => "FMA",
            Self::Eq => "EQ",
            Self::Neq => "NEQ",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Not => "NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Jmp => "JMP",
            Self::Jmpt => "JMPT",
            Self::Jmpf => "JMPF",
            Self::Call => "CALL",
            Self::Halt => "HALT",
        }
    }
}

/// How arithmetic and comparison opcodes read their operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NumericMode {
    Uint = 0,
    Int = 1,
    #[default]
    Float = 2,
}

impl NumericMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Uint),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            _ => None,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Uint => "u",
            Self::Int => "i",
            Self::Float => "f",
        }
    }
}

impl FromStr for NumericMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uint" | "unsigned" => Ok(Self::Uint),
            "int" | "signed" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            _ => Err(()),
        }
    }
}

/// A 16-bit operand address.
///
/// Bit 15 selects the space (0 = value memory, 1 = texture memory); bits
/// 14..0 are the index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(u16);

impl Address {
    const TEXTURE_BIT: u16 = 0x8000;

    /// Largest index addressable in either space.
    pub const MAX_INDEX: usize = 0x7fff;

    pub fn value(index: usize) -> Option<Self> {
        (index <= Self::MAX_INDEX).then(|| Self(index as u16))
    }

    pub fn texture(index: usize) -> Option<Self> {
        (index <= Self::MAX_INDEX).then(|| Self(index as u16 | Self::TEXTURE_BIT))
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_texture(self) -> bool {
        self.0 & Self::TEXTURE_BIT != 0
    }

    pub const fn index(self) -> usize {
        (self.0 & !Self::TEXTURE_BIT) as usize
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let space = if self.is_texture() { 't' } else { 'v' };
        write!(f, "{}{}", space, self.index())
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Push(Address),
    Pop(Address),
    Add(NumericMode),
    Sub(NumericMode),
    Mul(NumericMode),
    Div(NumericMode),
    Neg(NumericMode),
    Abs(NumericMode),
    Fma(NumericMode),
    Eq(NumericMode),
    Neq(NumericMode),
    Gt(NumericMode),
    Gte(NumericMode),
    Lt(NumericMode),
    Lte(NumericMode),
    Not,
    And,
    Or,
    Jmp(u16),
    Jmpt(u16),
    Jmpf(u16),
    Call(u16),
    Halt,
}

impl Instruction {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Nop => OpCode::Nop,
            Self::Push(_) => OpCode::Push,
            Self::Pop(_) => OpCode::Pop,
            Self::Add(_) => OpCode::Add,
            Self::Sub(_) => OpCode::Sub,
            Self::Mul(_) => OpCode::Mul,
            Self::Div(_) => OpCode::Div,
            Self::Neg(_) => OpCode::Neg,
            Self::Abs(_) => OpCode::Abs,
            Self::Fma(_) => OpCode::Fma,
            Self::Eq(_) => OpCode::Eq,
            Self::Neq(_) => OpCode::Neq,
            Self::Gt(_) => OpCode::Gt,
            Self::Gte(_) => OpCode::Gte,
            Self::Lt(_) => OpCode::Lt,
            Self::Lte(_) => OpCode::Lte,
            Self::Not => OpCode::Not,
            Self::And => OpCode::And,
            Self::Or => OpCode::Or,
            Self::Jmp(_) => OpCode::Jmp,
            Self::Jmpt(_) => OpCode::Jmpt,
            Self::Jmpf(_) => OpCode::Jmpf,
            Self::Call(_) => OpCode::Call,
            Self::Halt => OpCode::Halt,
        }
    }

    fn mode(&self) -> Option<NumericMode> {
        match *self {
            Self::Add(m) | Self::Sub(m) | Self::Mul(m) | Self::Div(m) => Some(m),
            Self::Neg(m) | Self::Abs(m) | Self::Fma(m) => Some(m),
            Self::Eq(m) | Self::Neq(m) | Self::Gt(m) | Self::Gte(m) | Self::Lt(m) | Self::Lte(m) => {
                Some(m)
            }
            _ => None,
        }
    }

    fn wide_operand(&self) -> Option<u16> {
        match *self {
            Self::Push(addr) | Self::Pop(addr) => Some(addr.raw()),
            Self::Jmp(target) | Self::Jmpt(target) | Self::Jmpf(target) | Self::Call(target) => {
                Some(target)
            }
            _ => None,
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + self.mode().map_or(0, |_| 1) + self.wide_operand().map_or(0, |_| 2)
    }

    /// Append the encoding of this instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        if let Some(mode) = self.mode() {
            out.push(mode as u8);
        }
        if let Some(operand) = self.wide_operand() {
            out.extend_from_slice(&operand.to_be_bytes());
        }
    }

    /// Decode the instruction starting at byte offset `at`.
    ///
    /// Returns the instruction and the offset of the next one.
    pub fn decode(bytes: &[u8], at: usize) -> Result<(Self, usize), Trap> {
        let opcode_byte = *bytes
            .get(at)
            .ok_or(Trap::InstructionPointerOutOfRange { at })?;
        let opcode = OpCode::from_byte(opcode_byte).ok_or(Trap::InvalidOpcode {
            at,
            opcode: opcode_byte,
        })?;

        let mode = |offset: usize| -> Result<NumericMode, Trap> {
            let byte = *bytes
                .get(offset)
                .ok_or(Trap::TruncatedInstruction { at })?;
            NumericMode::from_byte(byte).ok_or(Trap::InvalidMode { at, mode: byte })
        };
        let wide = |offset: usize| -> Result<u16, Trap> {
            match bytes.get(offset..offset + 2) {
                Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
                _ => Err(Trap::TruncatedInstruction { at }),
            }
        };

        let operand = at + 1;
        let instruction = match opcode {
            OpCode::Nop => Self::Nop,
            OpCode::Push => Self::Push(Address::from_raw(wide(operand)?)),
            OpCode::Pop => Self::Pop(Address::from_raw(wide(operand)?)),
            OpCode::Add => Self::Add(mode(operand)?),
            OpCode::Sub => Self::Sub(mode(operand)?),
            OpCode::Mul => Self::Mul(mode(operand)?),
            OpCode::Div => Self::Div(mode(operand)?),
            OpCode::Neg => Self::Neg(mode(operand)?),
            OpCode::Abs => Self::Abs(mode(operand)?),
            OpCode::Fma => Self::Fma(mode(operand)?),
            OpCode::Eq => Self::Eq(mode(operand)?),
            OpCode::Neq => Self::Neq(mode(operand)?),
            OpCode::Gt => Self::Gt(mode(operand)?),
            OpCode::Gte => Self::Gte(mode(operand)?),
            OpCode::Lt => Self::Lt(mode(operand)?),
            OpCode::Lte => Self::Lte(mode(operand)?),
            OpCode::Not => Self::Not,
            OpCode::And => Self::And,
            OpCode::Or => Self::Or,
            OpCode::Jmp => Self::Jmp(wide(operand)?),
            OpCode::Jmpt => Self::Jmpt(wide(operand)?),
            OpCode::Jmpf => Self::Jmpf(wide(operand)?),
            OpCode::Call => Self::Call(wide(operand)?),
            OpCode::Halt => Self::Halt,
        };

        Ok((instruction, at + instruction.encoded_len()))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.opcode().mnemonic();
        match *self {
            Self::Push(addr) | Self::Pop(addr) => write!(f, "{mnemonic} {addr}"),
            Self::Jmp(t) | Self::Jmpt(t) | Self::Jmpf(t) => write!(f, "{mnemonic} @{t:04}"),
            Self::Call(index) => write!(f, "{mnemonic} {index}"),
            _ => match self.mode() {
                Some(mode) => write!(f, "{mnemonic}.{}", mode.suffix()),
                None => f.write_str(mnemonic),
            },
        }
    }
}
