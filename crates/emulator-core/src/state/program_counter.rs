use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange};
use crate::config::DeviceConfig;
use crate::fault::ConfigurationError;

/// Double-buffered fetch address.
///
/// `current` is stable for a whole tick. Every write lands in `next`, which
/// becomes `current` on the following tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCounter {
    current: u32,
    next: u32,
    identity: MmioIdentity,
}

impl Default for ProgramCounter {
    fn default() -> Self {
        Self::new(MmioIdentity::unmapped("pc"))
    }
}

impl ProgramCounter {
    /// Creates a zeroed program counter exposed under `identity`.
    #[must_use]
    pub const fn new(identity: MmioIdentity) -> Self {
        Self {
            current: 0,
            next: 0,
            identity,
        }
    }

    /// Fetch address for the running tick.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Address that becomes `current` on the next tick.
    #[must_use]
    pub const fn next(&self) -> u32 {
        self.next
    }

    /// Redirects the following fetch.
    pub fn set_next(&mut self, address: u32) {
        self.next = address;
    }

    /// Performs the per-tick advance: `current <- next; next <- next + 1`.
    pub fn advance(&mut self) {
        self.current = self.next;
        self.next = self.next.wrapping_add(1);
    }
}

impl FromDeviceConfig for ProgramCounter {
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(MmioIdentity::from(config)))
    }
}

impl MmioDevice for ProgramCounter {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn range(&self) -> MmioRange {
        self.identity.range
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        self.current.to_be_bytes()[(offset % 4) as usize]
    }

    fn read_integer(&mut self, _offset: u32) -> u32 {
        self.current
    }

    fn write_byte(&mut self, _offset: u32, _value: u8) {}

    fn write_integer(&mut self, _offset: u32, value: u32) {
        self.set_next(value);
    }

    fn tick(&mut self) {
        self.advance();
    }

    fn reset(&mut self) {
        self.current = 0;
        self.next = 0;
    }
}
