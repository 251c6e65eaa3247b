//! Single accumulator register with carry/overflow flags.
//!
//! Storage is 64 bits wide. Flags are computed from the exact 64-bit result of
//! each operation; [`AccumulatorWidth`] decides whether the stored value is then
//! folded back into the signed 32-bit range.

/// How much of the 64-bit accumulator survives an arithmetic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccumulatorWidth {
    /// Results are truncated to signed 32 bits after flags are computed.
    #[default]
    Truncated32,
    /// The full 64-bit result is retained; only reads observe 32 bits.
    Wide64,
}

impl AccumulatorWidth {
    /// Folds an exact result into the stored representation for this width.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn normalize(self, value: i64) -> i64 {
        match self {
            Self::Truncated32 => value as i32 as i64,
            Self::Wide64 => value,
        }
    }
}

/// Returns true when `value` cannot be represented as a signed 32-bit integer.
#[must_use]
pub fn outside_i32(value: i64) -> bool {
    i32::try_from(value).is_err()
}

/// Accumulator register plus its two status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Register {
    accumulator: i64,
    carry: bool,
    overflow: bool,
    width: AccumulatorWidth,
}

impl Register {
    /// Creates a cleared register for the given accumulator width.
    #[must_use]
    pub const fn new(width: AccumulatorWidth) -> Self {
        Self {
            accumulator: 0,
            carry: false,
            overflow: false,
            width,
        }
    }

    /// Clears value and flags, keeping the configured width.
    pub fn reset(&mut self) {
        *self = Self::new(self.width);
    }

    /// Configured accumulator width.
    #[must_use]
    pub const fn width(&self) -> AccumulatorWidth {
        self.width
    }

    /// Low 32 bits of the accumulator as a signed value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn get(&self) -> i32 {
        self.accumulator as i32
    }

    /// Low 32 bits of the accumulator as a bus word.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn word(&self) -> u32 {
        self.get() as u32
    }

    /// Raw stored accumulator, all 64 bits.
    #[must_use]
    pub const fn accumulator(&self) -> i64 {
        self.accumulator
    }

    /// Carry flag.
    #[must_use]
    pub const fn carry(&self) -> bool {
        self.carry
    }

    /// Overflow flag.
    #[must_use]
    pub const fn overflow(&self) -> bool {
        self.overflow
    }

    /// Zero test over the stored accumulator.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.accumulator == 0
    }

    /// Sign test over the stored accumulator.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.accumulator < 0
    }

    /// Stores `value` and clears both flags.
    pub fn set(&mut self, value: i64) {
        self.store(value, false, false);
    }

    /// Stores a bus word, sign-extended from 32 bits, and clears both flags.
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_word(&mut self, word: u32) {
        self.set(i64::from(word as i32));
    }

    /// Adds `operand`. Carry reports a result outside the signed 32-bit range;
    /// overflow is always cleared.
    pub fn add_to(&mut self, operand: i64) {
        let exact = self.accumulator.wrapping_add(operand);
        self.store(exact, outside_i32(exact), false);
    }

    /// Subtracts `operand` by adding its negation.
    pub fn subtract(&mut self, operand: i64) {
        self.add_to(operand.wrapping_neg());
    }

    /// Multiplies by `operand`. Overflow reports a result outside the signed
    /// 32-bit range; carry is always cleared.
    pub fn multiply_by(&mut self, operand: i64) {
        let exact = self.accumulator.wrapping_mul(operand);
        self.store(exact, false, outside_i32(exact));
    }

    /// Divides by `operand`, truncating toward zero.
    ///
    /// Division by zero leaves the value untouched and sets both flags.
    pub fn divide_by(&mut self, operand: i64) {
        if operand == 0 {
            self.carry = true;
            self.overflow = true;
            return;
        }
        let exact = self.accumulator.wrapping_div(operand);
        self.store(exact, false, outside_i32(exact));
    }

    /// Bitwise complement.
    pub fn complement(&mut self) {
        self.set(!self.accumulator);
    }

    /// Two's complement negation.
    pub fn negate(&mut self) {
        self.set(self.accumulator.wrapping_neg());
    }

    /// Bitwise AND.
    pub fn and(&mut self, operand: i64) {
        self.set(self.accumulator & operand);
    }

    /// Bitwise OR.
    pub fn or(&mut self, operand: i64) {
        self.set(self.accumulator | operand);
    }

    /// Bitwise XOR.
    pub fn xor(&mut self, operand: i64) {
        self.set(self.accumulator ^ operand);
    }

    /// Shift left by `amount` bits.
    pub fn shift_left(&mut self, amount: u8) {
        self.set(self.accumulator.wrapping_shl(u32::from(amount)));
    }

    /// Logical shift right over the active width; vacated bits are zero.
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation
    )]
    pub fn shift_right(&mut self, amount: u8) {
        let amount = u32::from(amount);
        let shifted = match self.width {
            AccumulatorWidth::Truncated32 => {
                i64::from((self.accumulator as i32 as u32).wrapping_shr(amount) as i32)
            }
            AccumulatorWidth::Wide64 => (self.accumulator as u64).wrapping_shr(amount) as i64,
        };
        self.set(shifted);
    }

    /// Arithmetic shift right; vacated bits copy the sign.
    pub fn signed_shift_right(&mut self, amount: u8) {
        self.set(self.accumulator.wrapping_shr(u32::from(amount)));
    }

    fn store(&mut self, exact: i64, carry: bool, overflow: bool) {
        self.accumulator = self.width.normalize(exact);
        self.carry = carry;
        self.overflow = overflow;
    }
}
