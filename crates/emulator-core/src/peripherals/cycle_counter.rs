use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange};
use crate::config::DeviceConfig;
use crate::fault::ConfigurationError;

/// Read-only 64-bit count of clock pulses received.
///
/// Bytes `0..8` expose the count big-endian. Word offset 4 is the low half;
/// every other word offset reads the high half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleCounter {
    identity: MmioIdentity,
    cycles: u64,
}

impl CycleCounter {
    /// Creates a zeroed counter.
    #[must_use]
    pub const fn new(identity: MmioIdentity) -> Self {
        Self {
            identity,
            cycles: 0,
        }
    }

    /// Pulses received since construction or the last reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl FromDeviceConfig for CycleCounter {
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(MmioIdentity::from(config)))
    }
}

impl MmioDevice for CycleCounter {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn range(&self) -> MmioRange {
        self.identity.range
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        self.cycles
            .to_be_bytes()
            .get(offset as usize)
            .copied()
            .unwrap_or(0)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_integer(&mut self, offset: u32) -> u32 {
        if offset == 4 {
            self.cycles as u32
        } else {
            (self.cycles >> 32) as u32
        }
    }

    fn write_byte(&mut self, _offset: u32, _value: u8) {}

    fn write_integer(&mut self, _offset: u32, _value: u32) {}

    fn tick(&mut self) {
        self.cycles = self.cycles.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.cycles = 0;
    }
}
