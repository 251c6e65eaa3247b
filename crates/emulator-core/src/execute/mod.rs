//! Tick-driven fetch/decode/execute engine.
//!
//! One tick runs in a fixed order:
//! 1. Broadcast the pulse to the program counter and every peripheral
//! 2. Arbitrate interrupts; a serviced interrupt ends the tick
//! 3. Fetch the opcode byte at the PC's `current` address
//! 4. Decode, reading a wide immediate from `current + 1` unless the opcode
//!    is a conditional jump whose condition fails
//! 5. Execute
//!
//! A fatal error latches its fault code. Every later tick fails fast with
//! [`CoreError::FaultLatched`] until the engine is rebuilt.

mod dispatch;

pub use dispatch::{branch_taken, Effect};

use std::fmt;

use tracing::{error, info, trace};

use crate::api::{CoreConfig, TickOutcome, TraceEvent, TraceSink};
use crate::decoder::Decoder;
use crate::fault::{ConfigurationError, CoreError, FaultCode};
use crate::interrupt::InterruptArbiter;
use crate::memory::AddressSpace;
use crate::snapshot::MachineSnapshot;
use crate::state::{ProgramCounter, RegisterFile};

/// The engine composing address space, registers, PC and arbiter.
pub struct ExecutionEngine {
    config: CoreConfig,
    space: AddressSpace,
    arbiter: InterruptArbiter,
    tick_count: u64,
    latched_fault: Option<FaultCode>,
    trace: Option<Box<dyn TraceSink>>,
}

impl ExecutionEngine {
    /// Wraps a fully registered address space and seals its device map.
    ///
    /// The register file inside `space` keeps the width it was built with.
    #[must_use]
    pub fn new(config: CoreConfig, mut space: AddressSpace) -> Self {
        space.seal();
        Self {
            config,
            space,
            arbiter: InterruptArbiter::new(),
            tick_count: 0,
            latched_fault: None,
            trace: None,
        }
    }

    /// Builds an engine over `ram_size` bytes of RAM with no bus windows.
    ///
    /// # Errors
    ///
    /// Never fails for unmapped windows; the signature matches bring-up.
    pub fn with_ram(config: CoreConfig, ram_size: u32) -> Result<Self, ConfigurationError> {
        let space = AddressSpace::new(
            ram_size,
            RegisterFile::new(config.accumulator_width),
            ProgramCounter::default(),
        )?;
        Ok(Self::new(config, space))
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The address space.
    #[must_use]
    pub const fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    /// Mutable address space, for host-side pokes between ticks. The device
    /// map is sealed, so no new device can be mapped through it.
    pub fn address_space_mut(&mut self) -> &mut AddressSpace {
        &mut self.space
    }

    /// The register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        self.space.registers()
    }

    /// The program counter.
    #[must_use]
    pub const fn program_counter(&self) -> &ProgramCounter {
        self.space.program_counter()
    }

    /// The interrupt arbiter.
    #[must_use]
    pub const fn arbiter(&self) -> &InterruptArbiter {
        &self.arbiter
    }

    /// Ticks delivered so far, including failed ones.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The latched fault, if a fatal error occurred.
    #[must_use]
    pub const fn latched_fault(&self) -> Option<FaultCode> {
        self.latched_fault
    }

    /// Installs or removes the trace sink, returning the previous one.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        std::mem::replace(&mut self.trace, sink)
    }

    /// Copies a program image into RAM at address 0.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ImageTooLarge`] when the image exceeds RAM.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), ConfigurationError> {
        self.space.load_image(image)
    }

    /// Captures the architectural state.
    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot::capture(self)
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] on a decode failure or out-of-range RAM access,
    /// and [`CoreError::FaultLatched`] for any tick after such a failure.
    pub fn tick(&mut self) -> Result<TickOutcome, CoreError> {
        if let Some(code) = self.latched_fault {
            return Err(CoreError::FaultLatched(code));
        }
        self.tick_count += 1;
        self.space.broadcast_tick();

        if let Some(request) = self.arbiter.arbitrate(&mut self.space) {
            self.emit(TraceEvent::InterruptServiced {
                tick: self.tick_count,
                device: request.device,
                vector: request.vector,
                return_address: request.return_address,
            });
            return Ok(TickOutcome::InterruptServiced {
                device: request.device,
                vector: request.vector,
                return_address: request.return_address,
            });
        }

        self.fetch_and_execute().inspect_err(|fault| {
            let cause = fault.fault_code();
            self.latched_fault = Some(cause);
            error!(tick = self.tick_count, %fault, "fatal fault latched");
            self.emit(TraceEvent::FaultRaised {
                tick: self.tick_count,
                cause,
            });
        })
    }

    fn fetch_and_execute(&mut self) -> Result<TickOutcome, CoreError> {
        let address = self.space.program_counter().current();
        let byte = self.space.read_byte(address)?;
        self.emit(TraceEvent::TickStarted {
            tick: self.tick_count,
            pc: address,
            opcode: byte,
        });

        let (opcode, _) = Decoder::classify(byte, address)?;
        if opcode.is_conditional_jump() && !branch_taken(opcode, self.space.registers().target()) {
            dispatch::skip_untaken_branch(&mut self.space, &self.config, address);
            trace!(address, mnemonic = opcode.mnemonic(), "branch not taken");
            return Ok(TickOutcome::BranchNotTaken { address, opcode });
        }

        let space = &mut self.space;
        let instruction =
            Decoder::decode_with::<CoreError, _>(byte, address, |at| space.read_integer(at))?;
        trace!(address, %instruction, "executing");

        match dispatch::execute_instruction(&mut self.space, &self.config, address, instruction)? {
            Effect::Continue => Ok(TickOutcome::Executed {
                address,
                instruction,
            }),
            Effect::Halt => {
                info!(tick = self.tick_count, address, "halted");
                self.emit(TraceEvent::Halted {
                    tick: self.tick_count,
                    pc: address,
                });
                Ok(TickOutcome::Halted { address })
            }
            Effect::Reset => {
                info!(tick = self.tick_count, address, "machine reset");
                self.emit(TraceEvent::Reset {
                    tick: self.tick_count,
                    pc: address,
                });
                Ok(TickOutcome::Reset { address })
            }
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(sink) = self.trace.as_mut() {
            sink.on_event(event);
        }
    }
}

impl fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .field("space", &self.space)
            .field("arbiter", &self.arbiter)
            .field("tick_count", &self.tick_count)
            .field("latched_fault", &self.latched_fault)
            .field("tracing", &self.trace.is_some())
            .finish()
    }
}
