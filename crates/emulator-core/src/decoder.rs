//! Instruction decoder for the Nibble32 ISA.
//!
//! Decoding is exact-byte first, then high-nibble family. Wide-immediate
//! opcodes pull their 4-byte operand through a caller-supplied reader so the
//! same path serves the live bus and static byte slices.

use std::fmt;

use crate::encoding::{classify_byte, EncodingKind, Opcode};
use crate::fault::DecodeError;
use crate::memory::read_u32_be;
use crate::state::RegisterIndex;

/// Operand carried by a decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
    /// Zero-operand opcode.
    None,
    /// Register named by the low nibble.
    Register(RegisterIndex),
    /// Shift amount taken from the low nibble (`0..=15`).
    Shift(u8),
    /// 32-bit big-endian immediate following the opcode byte.
    Immediate(u32),
}

/// A fully decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    opcode: Opcode,
    operand: Operand,
}

impl DecodedInstruction {
    /// Pairs an opcode with an operand, rejecting operands of the wrong kind
    /// and shift amounts above 15.
    #[must_use]
    pub fn new(opcode: Opcode, operand: Operand) -> Option<Self> {
        let fits = match (opcode.encoding(), operand) {
            (EncodingKind::ZeroOperand, Operand::None)
            | (EncodingKind::RegisterNibble, Operand::Register(_))
            | (EncodingKind::WideImmediate, Operand::Immediate(_)) => true,
            (EncodingKind::ShiftNibble, Operand::Shift(amount)) => amount <= 0x0F,
            _ => false,
        };
        fits.then_some(Self { opcode, operand })
    }

    /// Decoded opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Decoded operand.
    #[must_use]
    pub const fn operand(&self) -> Operand {
        self.operand
    }

    /// Encoded width in bytes.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.opcode.encoding().width()
    }

    /// Re-emits the byte encoding: one byte, or five for wide immediates.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let base = self.opcode.base_byte();
        match self.operand {
            Operand::None => vec![base],
            Operand::Register(index) => vec![base | index.value()],
            Operand::Shift(amount) => vec![base | (amount & 0x0F)],
            Operand::Immediate(value) => {
                let mut bytes = Vec::with_capacity(5);
                bytes.push(base);
                bytes.extend_from_slice(&value.to_be_bytes());
                bytes
            }
        }
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())?;
        match self.operand {
            Operand::None => Ok(()),
            Operand::Register(index) => write!(f, " {index}"),
            Operand::Shift(amount) => write!(f, " {amount}"),
            Operand::Immediate(value) => write!(f, " {value:#010X}"),
        }
    }
}

/// Stateless opcode decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    /// Classifies the opcode byte fetched at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the byte matches neither exactly nor by family.
    pub fn classify(byte: u8, address: u32) -> Result<(Opcode, EncodingKind), DecodeError> {
        classify_byte(byte).ok_or(DecodeError { byte, address })
    }

    /// Decodes the opcode byte fetched at `address`, calling `read_immediate`
    /// with `address + 1` for wide-immediate opcodes.
    ///
    /// # Errors
    ///
    /// Propagates [`DecodeError`] (converted into `E`) or any error from the reader.
    pub fn decode_with<E, F>(
        byte: u8,
        address: u32,
        read_immediate: F,
    ) -> Result<DecodedInstruction, E>
    where
        E: From<DecodeError>,
        F: FnOnce(u32) -> Result<u32, E>,
    {
        let (opcode, kind) = Self::classify(byte, address)?;
        let nibble = byte & 0x0F;
        let operand = match kind {
            EncodingKind::ZeroOperand => Operand::None,
            EncodingKind::RegisterNibble => Operand::Register(RegisterIndex::from_nibble(nibble)),
            EncodingKind::ShiftNibble => Operand::Shift(nibble),
            EncodingKind::WideImmediate => {
                Operand::Immediate(read_immediate(address.wrapping_add(1))?)
            }
        };
        Ok(DecodedInstruction { opcode, operand })
    }

    /// Decodes the instruction at the start of `bytes`, treating `bytes[0]` as
    /// living at `address`.
    ///
    /// Returns `Ok(None)` when `bytes` is empty or a wide immediate is cut short.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the first byte is not an opcode.
    pub fn decode_bytes(
        bytes: &[u8],
        address: u32,
    ) -> Result<Option<DecodedInstruction>, DecodeError> {
        let Some(&byte) = bytes.first() else {
            return Ok(None);
        };
        let decoded = Self::decode_with(byte, address, |_| {
            read_u32_be(bytes, 1).ok_or(DecodeOutcome::Truncated)
        });
        match decoded {
            Ok(instruction) => Ok(Some(instruction)),
            Err(DecodeOutcome::Truncated) => Ok(None),
            Err(DecodeOutcome::Invalid(error)) => Err(error),
        }
    }
}

enum DecodeOutcome {
    Invalid(DecodeError),
    Truncated,
}

impl From<DecodeError> for DecodeOutcome {
    fn from(error: DecodeError) -> Self {
        Self::Invalid(error)
    }
}
