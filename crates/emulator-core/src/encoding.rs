/// Operand encoding carried by an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EncodingKind {
    /// One byte, no operand.
    ZeroOperand,
    /// One byte; the low nibble names a register.
    RegisterNibble,
    /// One byte; the low nibble is a shift amount.
    ShiftNibble,
    /// Opcode byte followed by a 4-byte big-endian immediate.
    WideImmediate,
}

impl EncodingKind {
    /// Total encoded width in bytes, opcode byte included.
    #[must_use]
    pub const fn width(self) -> u32 {
        match self {
            Self::WideImmediate => 5,
            Self::ZeroOperand | Self::RegisterNibble | Self::ShiftNibble => 1,
        }
    }

    /// Returns true when the low nibble of the opcode byte is an operand.
    #[must_use]
    pub const fn has_nibble_operand(self) -> bool {
        matches!(self, Self::RegisterNibble | Self::ShiftNibble)
    }
}

/// The closed Nibble32 opcode catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Opcode {
    Sel,
    Ldr,
    Str,
    Jr,
    Cp,
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    Ssr,
    Ldn,
    Stn,
    J,
    Jz,
    Jn,
    Jc,
    Jv,
    Com,
    Neg,
    Inc,
    Dec,
    Clr,
    Uno,
    Nop,
    Rst,
    Hlt,
}

/// Single source-of-truth opcode table: `(base byte, opcode, encoding)`.
///
/// Nibble-operand entries own every byte sharing their high nibble; the exact
/// `0xF_` entries take precedence because decode tries an exact match first.
pub const OPCODE_TABLE: &[(u8, Opcode, EncodingKind)] = &[
    (0x00, Opcode::Sel, EncodingKind::RegisterNibble),
    (0x10, Opcode::Ldr, EncodingKind::RegisterNibble),
    (0x20, Opcode::Str, EncodingKind::RegisterNibble),
    (0x30, Opcode::Jr, EncodingKind::RegisterNibble),
    (0x40, Opcode::Cp, EncodingKind::RegisterNibble),
    (0x50, Opcode::And, EncodingKind::RegisterNibble),
    (0x60, Opcode::Or, EncodingKind::RegisterNibble),
    (0x70, Opcode::Xor, EncodingKind::RegisterNibble),
    (0x80, Opcode::Add, EncodingKind::RegisterNibble),
    (0x90, Opcode::Sub, EncodingKind::RegisterNibble),
    (0xA0, Opcode::Mul, EncodingKind::RegisterNibble),
    (0xB0, Opcode::Div, EncodingKind::RegisterNibble),
    (0xC0, Opcode::Shl, EncodingKind::ShiftNibble),
    (0xD0, Opcode::Shr, EncodingKind::ShiftNibble),
    (0xE0, Opcode::Ssr, EncodingKind::ShiftNibble),
    (0xF0, Opcode::Ldn, EncodingKind::WideImmediate),
    (0xF1, Opcode::Stn, EncodingKind::WideImmediate),
    (0xF2, Opcode::J, EncodingKind::WideImmediate),
    (0xF3, Opcode::Jz, EncodingKind::WideImmediate),
    (0xF4, Opcode::Jn, EncodingKind::WideImmediate),
    (0xF5, Opcode::Jc, EncodingKind::WideImmediate),
    (0xF6, Opcode::Jv, EncodingKind::WideImmediate),
    (0xF7, Opcode::Com, EncodingKind::ZeroOperand),
    (0xF8, Opcode::Neg, EncodingKind::ZeroOperand),
    (0xF9, Opcode::Inc, EncodingKind::ZeroOperand),
    (0xFA, Opcode::Dec, EncodingKind::ZeroOperand),
    (0xFB, Opcode::Clr, EncodingKind::ZeroOperand),
    (0xFC, Opcode::Uno, EncodingKind::ZeroOperand),
    (0xFD, Opcode::Nop, EncodingKind::ZeroOperand),
    (0xFE, Opcode::Rst, EncodingKind::ZeroOperand),
    (0xFF, Opcode::Hlt, EncodingKind::ZeroOperand),
];

impl Opcode {
    /// Base byte value; the low nibble is zero for nibble-operand families.
    #[must_use]
    pub const fn base_byte(self) -> u8 {
        match self {
            Self::Sel => 0x00,
            Self::Ldr => 0x10,
            Self::Str => 0x20,
            Self::Jr => 0x30,
            Self::Cp => 0x40,
            Self::And => 0x50,
            Self::Or => 0x60,
            Self::Xor => 0x70,
            Self::Add => 0x80,
            Self::Sub => 0x90,
            Self::Mul => 0xA0,
            Self::Div => 0xB0,
            Self::Shl => 0xC0,
            Self::Shr => 0xD0,
            Self::Ssr => 0xE0,
            Self::Ldn => 0xF0,
            Self::Stn => 0xF1,
            Self::J => 0xF2,
            Self::Jz => 0xF3,
            Self::Jn => 0xF4,
            Self::Jc => 0xF5,
            Self::Jv => 0xF6,
            Self::Com => 0xF7,
            Self::Neg => 0xF8,
            Self::Inc => 0xF9,
            Self::Dec => 0xFA,
            Self::Clr => 0xFB,
            Self::Uno => 0xFC,
            Self::Nop => 0xFD,
            Self::Rst => 0xFE,
            Self::Hlt => 0xFF,
        }
    }

    /// Operand encoding of this opcode.
    #[must_use]
    pub const fn encoding(self) -> EncodingKind {
        match self.base_byte() {
            0x00..=0xB0 => EncodingKind::RegisterNibble,
            0xC0..=0xE0 => EncodingKind::ShiftNibble,
            0xF0..=0xF6 => EncodingKind::WideImmediate,
            _ => EncodingKind::ZeroOperand,
        }
    }

    /// True for the four flag-conditional jumps.
    #[must_use]
    pub const fn is_conditional_jump(self) -> bool {
        matches!(self, Self::Jz | Self::Jn | Self::Jc | Self::Jv)
    }

    /// Assembly mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sel => "SEL",
            Self::Ldr => "LDR",
            Self::Str => "STR",
            Self::Jr => "JR",
            Self::Cp => "CP",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Shl => "SHL",
            Self::Shr => "SHR",
            Self::Ssr => "SSR",
            Self::Ldn => "LDN",
            Self::Stn => "STN",
            Self::J => "J",
            Self::Jz => "JZ",
            Self::Jn => "JN",
            Self::Jc => "JC",
            Self::Jv => "JV",
            Self::Com => "COM",
            Self::Neg => "NEG",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::Clr => "CLR",
            Self::Uno => "UNO",
            Self::Nop => "NOP",
            Self::Rst => "RST",
            Self::Hlt => "HLT",
        }
    }
}

/// Classifies an opcode byte: exact byte match first, then the byte with its
/// low nibble masked to zero.
///
/// `None` means the byte belongs to no opcode family.
#[must_use]
pub fn classify_byte(byte: u8) -> Option<(Opcode, EncodingKind)> {
    let lookup = |value: u8| {
        OPCODE_TABLE
            .iter()
            .find_map(|(base, opcode, kind)| (*base == value).then_some((*opcode, *kind)))
    };

    lookup(byte).or_else(|| lookup(byte & 0xF0))
}
