use std::fmt;

use crate::api::{MmioDevice, MmioIdentity, MmioRange};
use crate::state::register::{AccumulatorWidth, Register};

/// Number of architecturally visible registers (`$0..$15`).
pub const REGISTER_COUNT: usize = 16;

/// Index of a register named by a 4-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterIndex(u8);

impl RegisterIndex {
    /// Register receiving the interrupted `next` address on interrupt service.
    pub const RETURN: Self = Self(15);

    /// Creates an index, rejecting values above 15.
    #[must_use]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < REGISTER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Takes the low nibble of an opcode byte as a register index.
    #[must_use]
    pub const fn from_nibble(byte: u8) -> Self {
        Self(byte & 0x0F)
    }

    /// Raw index value (`0..=15`).
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Array index of the register.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Ordered list of all sixteen indices.
    #[must_use]
    pub fn all() -> impl Iterator<Item = Self> {
        (0..16u8).map(Self)
    }
}

impl fmt::Display for RegisterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::RETURN {
            f.write_str("$RETURN")
        } else {
            write!(f, "${}", self.0)
        }
    }
}

/// Sixteen accumulator registers plus the target pointer.
///
/// The file doubles as the CPU register window on the bus: offset `o` maps to
/// register `o % 16`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    registers: [Register; REGISTER_COUNT],
    target: RegisterIndex,
    window: MmioIdentity,
}

impl RegisterFile {
    /// Creates a cleared register file targeting `$0`, with no bus window.
    #[must_use]
    pub fn new(width: AccumulatorWidth) -> Self {
        Self {
            registers: [Register::new(width); REGISTER_COUNT],
            target: RegisterIndex::default(),
            window: MmioIdentity::unmapped("cpu"),
        }
    }

    /// Places the register window on the bus.
    #[must_use]
    pub fn with_window(mut self, window: MmioIdentity) -> Self {
        self.window = window;
        self
    }

    /// Currently selected target register index.
    #[must_use]
    pub const fn target_index(&self) -> RegisterIndex {
        self.target
    }

    /// Points the target at `index`.
    pub fn select(&mut self, index: RegisterIndex) {
        self.target = index;
    }

    /// The currently selected target register.
    #[must_use]
    pub const fn target(&self) -> &Register {
        &self.registers[self.target.index()]
    }

    /// Mutable access to the selected target register.
    pub fn target_mut(&mut self) -> &mut Register {
        &mut self.registers[self.target.index()]
    }

    /// Register at `index`.
    #[must_use]
    pub const fn get(&self, index: RegisterIndex) -> &Register {
        &self.registers[index.index()]
    }

    /// Mutable register at `index`.
    pub fn get_mut(&mut self, index: RegisterIndex) -> &mut Register {
        &mut self.registers[index.index()]
    }

    /// Iterates all registers in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.registers.iter()
    }

    /// Clears every register and re-targets `$0`.
    pub fn clear(&mut self) {
        self.registers.iter_mut().for_each(Register::reset);
        self.target = RegisterIndex::default();
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn window_index(offset: u32) -> RegisterIndex {
        RegisterIndex::from_nibble((offset % REGISTER_COUNT as u32) as u8)
    }
}

impl MmioDevice for RegisterFile {
    fn name(&self) -> &str {
        &self.window.name
    }

    fn range(&self) -> MmioRange {
        self.window.range
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_byte(&mut self, offset: u32) -> u8 {
        self.get(Self::window_index(offset)).word() as u8
    }

    fn read_integer(&mut self, offset: u32) -> u32 {
        self.get(Self::window_index(offset)).word()
    }

    #[allow(clippy::cast_possible_wrap)]
    fn write_byte(&mut self, offset: u32, value: u8) {
        self.get_mut(Self::window_index(offset))
            .set(i64::from(value as i8));
    }

    fn write_integer(&mut self, offset: u32, value: u32) {
        self.get_mut(Self::window_index(offset)).set_word(value);
    }

    fn reset(&mut self) {
        self.clear();
    }
}
