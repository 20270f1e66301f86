//! Tagged 32-bit value cells.

use std::fmt;

/// One 32-bit cell of value memory or the operand stack.
///
/// The same bits are read as unsigned, signed, float or bool depending on the
/// instruction's numeric mode. Nothing is widened: every read and write goes
/// through the same 4 bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u32);

impl Value {
    pub const ZERO: Value = Value(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn from_uint(value: u32) -> Self {
        Self(value)
    }

    pub const fn from_int(value: i32) -> Self {
        Self(value as u32)
    }

    pub fn from_float(value: f32) -> Self {
        Self(value.to_bits())
    }

    pub const fn from_bool(value: bool) -> Self {
        Self(value as u32)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn as_uint(self) -> u32 {
        self.0
    }

    pub const fn as_int(self) -> i32 {
        self.0 as i32
    }

    pub fn as_float(self) -> f32 {
        f32::from_bits(self.0)
    }

    /// Any non-zero bit pattern is true.
    pub const fn as_bool(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value(0x{:08x} = {})", self.0, self.as_float())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::from_uint(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::from_int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::from_float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}
