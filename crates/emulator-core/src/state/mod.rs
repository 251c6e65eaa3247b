//! Architectural CPU state model primitives.

/// Accumulator register and ALU flag model.
pub mod register;
/// Register file, target pointer and the CPU register window.
pub mod registers;
/// Double-buffered program counter.
pub mod program_counter;
/// Clock-level run state.
pub mod run_state;

pub use program_counter::ProgramCounter;
pub use register::{AccumulatorWidth, Register};
pub use registers::{RegisterFile, RegisterIndex, REGISTER_COUNT};
pub use run_state::RunState;
