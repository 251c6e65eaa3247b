use crate::api::{FromDeviceConfig, MmioDevice, MmioIdentity, MmioRange};
use crate::config::DeviceConfig;
use crate::fault::ConfigurationError;

/// Word offset of the running count.
pub const TIMER_COUNT_OFFSET: u32 = 0;
/// Word offset of the period, in ticks.
pub const TIMER_FREQ_OFFSET: u32 = 4;
/// Word offset of the enable flag (non-zero = enabled).
pub const TIMER_ENABLED_OFFSET: u32 = 8;

/// Interval timer that raises its interrupt every `freq` ticks while enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    identity: MmioIdentity,
    vector: u32,
    freq: u32,
    count: u32,
    enabled: bool,
    pending: bool,
}

impl Timer {
    /// Creates a timer with the given interrupt vector and period.
    #[must_use]
    pub const fn new(identity: MmioIdentity, vector: u32, freq: u32, enabled: bool) -> Self {
        Self {
            identity,
            vector,
            freq,
            count: 0,
            enabled,
            pending: false,
        }
    }

    /// Ticks counted toward the next interrupt.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// True while the timer counts ticks.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    fn word(&self, offset: u32) -> u32 {
        match offset {
            TIMER_FREQ_OFFSET => self.freq,
            TIMER_ENABLED_OFFSET => u32::from(self.enabled),
            _ => self.count,
        }
    }
}

impl FromDeviceConfig for Timer {
    fn from_device_config(config: &DeviceConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::new(
            MmioIdentity::from(config),
            config.required_number("interrupt")?,
            config.required_number("freq")?,
            config.flag("enabled")?.unwrap_or(false),
        ))
    }
}

impl MmioDevice for Timer {
    fn name(&self) -> &str {
        &self.identity.name
    }

    fn range(&self) -> MmioRange {
        self.identity.range
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        self.word(offset & !3).to_be_bytes()[(offset % 4) as usize]
    }

    fn read_integer(&mut self, offset: u32) -> u32 {
        self.word(offset)
    }

    fn write_byte(&mut self, _offset: u32, _value: u8) {}

    fn write_integer(&mut self, offset: u32, value: u32) {
        match offset {
            TIMER_FREQ_OFFSET => self.freq = value,
            TIMER_ENABLED_OFFSET => self.enabled = value != 0,
            _ => self.count = value,
        }
    }

    fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        self.count = self.count.wrapping_add(1);
        if self.count == self.freq {
            self.pending = true;
            self.count = 0;
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.pending = false;
        self.enabled = false;
    }

    fn interrupt_pending(&self) -> bool {
        self.pending
    }

    fn take_interrupt_vector(&mut self) -> Option<u32> {
        self.pending = false;
        Some(self.vector)
    }
}
