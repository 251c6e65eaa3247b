//! Single-level interrupt arbitration.
//!
//! Arbitration runs after the tick broadcast and before fetch. The first
//! pending peripheral in registration order wins; later ones stay pending and
//! are retried on following ticks.

use tracing::debug;

use crate::api::DeviceId;
use crate::memory::AddressSpace;
use crate::state::RegisterIndex;

/// A serviced interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterruptRequest {
    /// Device whose vector was taken.
    pub device: DeviceId,
    /// Vector written to the PC's `next` cell.
    pub vector: u32,
    /// Address saved in `$RETURN`.
    pub return_address: u32,
}

/// Scans peripherals for a pending interrupt and vectors control to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptArbiter {
    serviced: u64,
}

impl InterruptArbiter {
    /// Creates an arbiter with no service history.
    #[must_use]
    pub const fn new() -> Self {
        Self { serviced: 0 }
    }

    /// Services at most one pending peripheral.
    ///
    /// The return address is the PC's `current` cell after the broadcast,
    /// which is the `next` value the tick started with. It lands in `$RETURN`
    /// and the vector becomes the new `next`.
    pub fn arbitrate(&mut self, space: &mut AddressSpace) -> Option<InterruptRequest> {
        let (device, vector) = space.take_pending_interrupt()?;
        let return_address = space.program_counter().current();
        space
            .registers_mut()
            .get_mut(RegisterIndex::RETURN)
            .set_word(return_address);
        space.program_counter_mut().set_next(vector);
        self.serviced += 1;
        debug!(%device, vector, return_address, "interrupt serviced");
        Some(InterruptRequest {
            device,
            vector,
            return_address,
        })
    }

    /// Interrupts serviced so far.
    #[must_use]
    pub const fn serviced(&self) -> u64 {
        self.serviced
    }
}
