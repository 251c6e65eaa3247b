//! Per-family instruction semantics.
//!
//! The decoder pairs every opcode with exactly one operand kind, so each
//! family handler ignores opcodes that belong to another family.

use crate::api::{CoreConfig, ResetBehavior, UntakenBranch};
use crate::decoder::{DecodedInstruction, Operand};
use crate::encoding::Opcode;
use crate::fault::CoreError;
use crate::memory::AddressSpace;
use crate::state::{Register, RegisterIndex};

/// Width of a wide-immediate encoding.
const WIDE_WIDTH: u32 = 5;

/// Control effect of an executed instruction beyond its state mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Keep ticking.
    Continue,
    /// Stop the clock.
    Halt,
    /// The machine was reset.
    Reset,
}

/// Executes one decoded instruction fetched at `address`.
///
/// # Errors
///
/// Returns [`CoreError::MemoryOutOfRange`] when a load or store misses RAM.
pub fn execute_instruction(
    space: &mut AddressSpace,
    config: &CoreConfig,
    address: u32,
    instruction: DecodedInstruction,
) -> Result<Effect, CoreError> {
    let opcode = instruction.opcode();
    match instruction.operand() {
        Operand::Register(index) => {
            execute_register(space, opcode, index).map(|()| Effect::Continue)
        }
        Operand::Shift(amount) => {
            execute_shift(space.registers_mut().target_mut(), opcode, amount);
            Ok(Effect::Continue)
        }
        Operand::Immediate(value) => {
            execute_wide(space, config, address, opcode, value).map(|()| Effect::Continue)
        }
        Operand::None => Ok(execute_zero_operand(space, config, opcode)),
    }
}

fn execute_register(
    space: &mut AddressSpace,
    opcode: Opcode,
    index: RegisterIndex,
) -> Result<(), CoreError> {
    let source = *space.registers().get(index);
    let operand = i64::from(source.get());
    match opcode {
        Opcode::Sel => space.registers_mut().select(index),
        Opcode::Ldr => {
            let value = space.read_integer(source.word())?;
            space.registers_mut().target_mut().set_word(value);
        }
        Opcode::Str => {
            let value = space.registers().target().word();
            space.write_integer(source.word(), value)?;
        }
        Opcode::Jr => space.program_counter_mut().set_next(source.word()),
        Opcode::Cp => {
            let value = space.registers().target().get();
            space.registers_mut().get_mut(index).set(i64::from(value));
        }
        Opcode::And => space.registers_mut().target_mut().and(operand),
        Opcode::Or => space.registers_mut().target_mut().or(operand),
        Opcode::Xor => space.registers_mut().target_mut().xor(operand),
        Opcode::Add => space.registers_mut().target_mut().add_to(operand),
        Opcode::Sub => space.registers_mut().target_mut().subtract(operand),
        Opcode::Mul => space.registers_mut().target_mut().multiply_by(operand),
        Opcode::Div => space.registers_mut().target_mut().divide_by(operand),
        _ => {}
    }
    Ok(())
}

fn execute_shift(target: &mut Register, opcode: Opcode, amount: u8) {
    match opcode {
        Opcode::Shl => target.shift_left(amount),
        Opcode::Shr => target.shift_right(amount),
        Opcode::Ssr => target.signed_shift_right(amount),
        _ => {}
    }
}

/// True when a jump opcode's condition holds on `target`.
#[must_use]
pub const fn branch_taken(opcode: Opcode, target: &Register) -> bool {
    match opcode {
        Opcode::J => true,
        Opcode::Jz => target.is_zero(),
        Opcode::Jn => target.is_negative(),
        Opcode::Jc => target.carry(),
        Opcode::Jv => target.overflow(),
        _ => false,
    }
}

fn execute_wide(
    space: &mut AddressSpace,
    config: &CoreConfig,
    address: u32,
    opcode: Opcode,
    value: u32,
) -> Result<(), CoreError> {
    let past_immediate = address.wrapping_add(WIDE_WIDTH);
    match opcode {
        Opcode::Ldn => {
            space.registers_mut().target_mut().set_word(value);
            space.program_counter_mut().set_next(past_immediate);
        }
        Opcode::Stn => {
            let word = space.registers().target().word();
            space.write_integer(value, word)?;
            space.program_counter_mut().set_next(past_immediate);
        }
        Opcode::J | Opcode::Jz | Opcode::Jn | Opcode::Jc | Opcode::Jv => {
            if branch_taken(opcode, space.registers().target()) {
                space.program_counter_mut().set_next(value);
            } else {
                skip_untaken_branch(space, config, address);
            }
        }
        _ => {}
    }
    Ok(())
}

/// Applies the configured PC advance for a conditional jump that is not taken.
pub fn skip_untaken_branch(space: &mut AddressSpace, config: &CoreConfig, address: u32) {
    if config.untaken_branch == UntakenBranch::SkipImmediate {
        space
            .program_counter_mut()
            .set_next(address.wrapping_add(WIDE_WIDTH));
    }
}

fn execute_zero_operand(space: &mut AddressSpace, config: &CoreConfig, opcode: Opcode) -> Effect {
    match (opcode, config.reset_behavior) {
        (Opcode::Hlt, _) | (Opcode::Rst, ResetBehavior::HaltOnly) => return Effect::Halt,
        (Opcode::Rst, ResetBehavior::FullReset) => {
            space.reset_devices();
            return Effect::Reset;
        }
        _ => {}
    }

    let target = space.registers_mut().target_mut();
    match opcode {
        Opcode::Com => target.complement(),
        Opcode::Neg => target.negate(),
        Opcode::Inc => target.add_to(1),
        Opcode::Dec => target.subtract(1),
        Opcode::Clr => target.set(0),
        Opcode::Uno => target.set(1),
        _ => {}
    }
    Effect::Continue
}
