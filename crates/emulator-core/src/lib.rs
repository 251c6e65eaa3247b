//! Core emulator crate for the Nibble32 accumulator CPU.

/// Fault taxonomy and error types.
pub mod fault;
pub use fault::{ConfigurationError, CoreError, DecodeError, FaultCode};

/// Opcode catalogue and byte classification table.
pub mod encoding;
pub use encoding::{classify_byte, EncodingKind, Opcode, OPCODE_TABLE};

/// Instruction decode with operand extraction.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder, Operand};

/// Architectural CPU state: registers, program counter and run state.
pub mod state;
pub use state::{
    AccumulatorWidth, ProgramCounter, Register, RegisterFile, RegisterIndex, RunState,
    REGISTER_COUNT,
};

/// Public host-facing API contracts and integration types.
pub mod api;
pub use api::{
    CoreConfig, DeviceId, FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange, ResetBehavior,
    TickOutcome, TraceEvent, TraceSink, UntakenBranch,
};

/// Bring-up configuration parsing.
pub mod config;
pub use config::{
    parse_flag, parse_number, BringUpConfig, DeviceConfig, PeripheralConfig, PeripheralKind,
    DEFAULT_RAM_SIZE,
};

/// Address space with RAM and MMIO routing.
pub mod memory;
pub use memory::{read_u32_be, write_u32_be, AddressSpace, DeviceMap, Route, WORD_ACCESS_BYTES};

/// Memory-mapped peripherals.
pub mod peripherals;
pub use peripherals::{
    format_word, CycleCounter, FileReader, FileWriter, Timer, READER_DATA_OFFSET,
    READER_EOF_OFFSET, TIMER_COUNT_OFFSET, TIMER_ENABLED_OFFSET, TIMER_FREQ_OFFSET,
};

/// Interrupt arbitration.
pub mod interrupt;
pub use interrupt::{InterruptArbiter, InterruptRequest};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{branch_taken, Effect, ExecutionEngine};

/// Clock driver.
pub mod clock;
pub use clock::{ClockDriver, RunSummary};

/// Machine assembly from bring-up configuration.
pub mod machine;
pub use machine::Machine;

/// Serializable machine state captures.
pub mod snapshot;
pub use snapshot::{MachineSnapshot, RegisterSnapshot};

/// Instruction disassembly helpers.
pub mod disasm;
pub use disasm::{disassemble, disassemble_window, DisassemblyRow};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
