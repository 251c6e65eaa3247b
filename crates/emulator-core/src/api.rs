//! Public host-facing API contracts for embedding the emulator core.

use std::fmt;

use crate::config::DeviceConfig;
use crate::decoder::DecodedInstruction;
use crate::encoding::Opcode;
use crate::fault::{ConfigurationError, FaultCode};
use crate::state::AccumulatorWidth;

/// What an `RST` opcode does to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ResetBehavior {
    /// Clears registers, re-targets `$0` and resets every device; the clock keeps running.
    #[default]
    FullReset,
    /// Stops the clock exactly like `HLT`.
    HaltOnly,
}

/// How far `next` moves when a conditional jump is not taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum UntakenBranch {
    /// Skip the whole 5-byte encoding.
    #[default]
    SkipImmediate,
    /// Keep only the one-byte auto-advance, landing inside the immediate.
    FallThroughByte,
}

/// Top-level configuration for an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Storage width of every accumulator register.
    pub accumulator_width: AccumulatorWidth,
    /// Contract honored by `RST`.
    pub reset_behavior: ResetBehavior,
    /// PC advance applied by untaken conditional jumps.
    pub untaken_branch: UntakenBranch,
}

/// Half-open `[start, start + length)` address claim on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MmioRange {
    /// First claimed address.
    pub start: u32,
    /// Number of claimed bytes. Zero claims nothing.
    pub length: u32,
}

impl MmioRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Exclusive end address, widened so the top of the address space is representable.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.start as u64 + self.length as u64
    }

    /// True when the range claims no address.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.length == 0
    }

    /// True when `address` falls inside the range.
    #[must_use]
    pub const fn contains(self, address: u32) -> bool {
        address >= self.start && (address as u64) < self.end()
    }

    /// Lowest address claimed by both ranges, if any.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn first_shared_address(self, other: Self) -> Option<u32> {
        let low = u64::from(self.start.max(other.start));
        let high = self.end().min(other.end());
        (low < high).then_some(low as u32)
    }
}

impl fmt::Display for MmioRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}+{:#X}", self.start, self.length)
    }
}

/// Name and bus claim shared by every configured device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MmioIdentity {
    /// Device name used in diagnostics.
    pub name: String,
    /// Claimed address range.
    pub range: MmioRange,
}

impl MmioIdentity {
    /// Creates an identity claiming `range`.
    #[must_use]
    pub fn new(name: impl Into<String>, range: MmioRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// Identity that claims no addresses.
    #[must_use]
    pub fn unmapped(name: impl Into<String>) -> Self {
        Self::new(name, MmioRange::default())
    }
}

impl From<&DeviceConfig> for MmioIdentity {
    fn from(config: &DeviceConfig) -> Self {
        Self::new(config.name(), config.range())
    }
}

/// Capability contract for every device reachable through the address space.
///
/// Offsets are local: the router subtracts the range start before calling in.
/// A word access starting inside a device is handed to the device whole, even
/// when it runs past the end of the claim.
pub trait MmioDevice: fmt::Debug {
    /// Device name used in diagnostics.
    fn name(&self) -> &str;

    /// Address range claimed on the bus.
    fn range(&self) -> MmioRange;

    /// Reads one byte at a local offset.
    fn read_byte(&mut self, offset: u32) -> u8;

    /// Reads one 32-bit word at a local offset.
    fn read_integer(&mut self, offset: u32) -> u32;

    /// Writes one byte at a local offset.
    fn write_byte(&mut self, offset: u32, value: u8);

    /// Writes one 32-bit word at a local offset.
    fn write_integer(&mut self, offset: u32, value: u32);

    /// Receives one clock pulse.
    fn tick(&mut self) {}

    /// Returns the device to its power-on state.
    fn reset(&mut self) {}

    /// True while the device requests service.
    fn interrupt_pending(&self) -> bool {
        false
    }

    /// Reads the interrupt vector, clearing the pending flag.
    ///
    /// Devices without interrupt support return `None`.
    fn take_interrupt_vector(&mut self) -> Option<u32> {
        None
    }
}

/// Devices that can be built from a parsed `key=value` configuration string.
pub trait FromDeviceConfig: Sized {
    /// Builds and configures the device.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when a device-specific key is missing or
    /// malformed, or a backing resource cannot be opened.
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError>;
}

/// Registration handle of a peripheral, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Result of one successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickOutcome {
    /// An instruction was fetched and executed.
    Executed {
        /// Fetch address.
        address: u32,
        /// The executed instruction.
        instruction: DecodedInstruction,
    },
    /// A conditional jump was not taken. Its immediate was never read.
    BranchNotTaken {
        /// Fetch address.
        address: u32,
        /// The conditional jump opcode.
        opcode: Opcode,
    },
    /// A pending device was serviced instead of fetching.
    InterruptServiced {
        /// The serviced peripheral.
        device: DeviceId,
        /// Vector written to the PC's `next` cell.
        vector: u32,
        /// Resume address stored in `$RETURN`.
        return_address: u32,
    },
    /// `HLT` (or `RST` in halt-only mode) executed; the clock should stop.
    Halted {
        /// Fetch address of the halting opcode.
        address: u32,
    },
    /// `RST` executed a full machine reset.
    Reset {
        /// Fetch address of the `RST` opcode.
        address: u32,
    },
}

impl TickOutcome {
    /// True when the clock must stop after this tick.
    #[must_use]
    pub const fn stops_clock(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }
}

/// Deterministic trace events emitted in tick order when a sink is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Fetch of an opcode byte.
    TickStarted {
        /// Engine tick number, starting at 1.
        tick: u64,
        /// Fetch address.
        pc: u32,
        /// Raw opcode byte.
        opcode: u8,
    },
    /// A pending device was serviced.
    InterruptServiced {
        /// Engine tick number.
        tick: u64,
        /// The serviced peripheral.
        device: DeviceId,
        /// Vector loaded into `next`.
        vector: u32,
        /// Value stored in `$RETURN`.
        return_address: u32,
    },
    /// The machine halted.
    Halted {
        /// Engine tick number.
        tick: u64,
        /// Fetch address of the halting opcode.
        pc: u32,
    },
    /// The machine performed a full reset.
    Reset {
        /// Engine tick number.
        tick: u64,
        /// Fetch address of the `RST` opcode.
        pc: u32,
    },
    /// A fatal fault was latched.
    FaultRaised {
        /// Engine tick number.
        tick: u64,
        /// Latched fault.
        cause: FaultCode,
    },
}

/// Sink trait for deterministic trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
