//! Instruction disassembly for the Nibble32 ISA.
//!
//! Every byte is an opcode, so a linear sweep never meets an illegal
//! encoding. The only irregular row is a wide immediate cut short by the end
//! of the input, which is shown as raw data.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::decoder::{Decoder, Operand};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the opcode byte.
    pub address: u32,
    /// Raw encoding, 1 or 5 bytes (fewer for a truncated row).
    pub bytes: Vec<u8>,
    /// The instruction mnemonic (e.g. `SEL`, `LDN`), or `.byte` for truncated data.
    pub mnemonic: String,
    /// The formatted operand (e.g. `$3`, `4`, `0x00000010`).
    pub operands: String,
    /// True when a wide immediate ran past the end of the input.
    pub truncated: bool,
}

impl DisassemblyRow {
    /// Space-separated hex dump of the raw bytes.
    #[must_use]
    pub fn hex_bytes(&self) -> String {
        self.bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Disassembles `image`, whose first byte lives at bus address `start`.
#[must_use]
pub fn disassemble(image: &[u8], start: u32) -> Vec<DisassemblyRow> {
    let mut rows = Vec::new();
    let mut offset = 0usize;
    while offset < image.len() {
        let address = start.wrapping_add(u32::try_from(offset).unwrap_or(u32::MAX));
        let row = disassemble_one(&image[offset..], address);
        offset += row.bytes.len();
        rows.push(row);
    }
    rows
}

/// Disassembles at most `count` instructions starting at `address` inside a
/// RAM image. Rows stop at the end of the image.
#[must_use]
pub fn disassemble_window(memory: &[u8], address: u32, count: usize) -> Vec<DisassemblyRow> {
    let Some(window) = usize::try_from(address)
        .ok()
        .and_then(|offset| memory.get(offset..))
    else {
        return Vec::new();
    };
    let mut rows = disassemble(window, address);
    rows.truncate(count);
    rows
}

fn disassemble_one(bytes: &[u8], address: u32) -> DisassemblyRow {
    match Decoder::decode_bytes(bytes, address) {
        Ok(Some(instruction)) => {
            let operands = match instruction.operand() {
                Operand::None => String::new(),
                Operand::Register(index) => index.to_string(),
                Operand::Shift(amount) => amount.to_string(),
                Operand::Immediate(value) => format!("{value:#010X}"),
            };
            DisassemblyRow {
                address,
                bytes: instruction.encode(),
                mnemonic: instruction.opcode().mnemonic().to_owned(),
                operands,
                truncated: false,
            }
        }
        Ok(None) | Err(_) => DisassemblyRow {
            address,
            bytes: bytes.to_vec(),
            mnemonic: ".byte".to_owned(),
            operands: bytes
                .iter()
                .map(|byte| format!("{byte:#04X}"))
                .collect::<Vec<_>>()
                .join(", "),
            truncated: true,
        },
    }
}
