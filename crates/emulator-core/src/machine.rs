//! A complete machine assembled from a bring-up description.

use tracing::debug;

use crate::api::{CoreConfig, DeviceId, FromDeviceConfig, MmioDevice, MmioIdentity};
use crate::clock::{ClockDriver, RunSummary};
use crate::config::{BringUpConfig, PeripheralKind};
use crate::execute::ExecutionEngine;
use crate::fault::{ConfigurationError, CoreError};
use crate::memory::AddressSpace;
use crate::peripherals::{CycleCounter, FileReader, FileWriter, Timer};
use crate::snapshot::MachineSnapshot;
use crate::state::{ProgramCounter, RegisterFile};

/// Engine plus the clock that drives it.
#[derive(Debug)]
pub struct Machine {
    engine: ExecutionEngine,
    clock: ClockDriver,
}

impl Machine {
    /// Wraps an engine with a stopped clock.
    #[must_use]
    pub const fn new(engine: ExecutionEngine) -> Self {
        Self {
            engine,
            clock: ClockDriver::new(),
        }
    }

    /// Instantiates and registers every declared device.
    ///
    /// Registration order is the CPU window, the PC, the cycle counter, then
    /// peripherals in declaration order. That order is also interrupt priority.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for overlapping claims or any device that
    /// cannot be built.
    pub fn from_bring_up(config: &BringUpConfig) -> Result<Self, ConfigurationError> {
        let core: CoreConfig = config.core;
        let registers = RegisterFile::new(core.accumulator_width)
            .with_window(MmioIdentity::from(&config.cpu));
        let program_counter = ProgramCounter::from_device_config(&config.program_counter)?;
        let mut space = AddressSpace::new(config.ram_size, registers, program_counter)?;

        space.register_mmio(Box::new(CycleCounter::from_device_config(&config.clock)?))?;
        for peripheral in &config.peripherals {
            let device: Box<dyn MmioDevice> = match peripheral.kind {
                PeripheralKind::Timer => Box::new(Timer::from_device_config(&peripheral.config)?),
                PeripheralKind::FileWriter => {
                    Box::new(FileWriter::from_device_config(&peripheral.config)?)
                }
                PeripheralKind::FileReader => {
                    Box::new(FileReader::from_device_config(&peripheral.config)?)
                }
            };
            space.register_mmio(device)?;
        }
        debug!(
            devices = space.map().len(),
            ram = space.ram_size(),
            "machine assembled"
        );

        Ok(Self::new(ExecutionEngine::new(core, space)))
    }

    /// Copies a program image into RAM at address 0.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ImageTooLarge`] when the image exceeds RAM.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), ConfigurationError> {
        self.engine.load_image(image)
    }

    /// Starts the clock.
    pub fn start(&mut self) {
        self.clock.start();
    }

    /// Stops the clock.
    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Delivers one tick if running.
    ///
    /// # Errors
    ///
    /// Propagates the engine's fatal [`CoreError`].
    pub fn step(&mut self) -> Result<bool, CoreError> {
        self.clock.step(&mut self.engine)
    }

    /// Ticks until stopped or `limit` ticks are delivered.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal [`CoreError`].
    pub fn run(&mut self, limit: Option<u64>) -> Result<RunSummary, CoreError> {
        self.clock.run(&mut self.engine, limit)
    }

    /// The engine.
    #[must_use]
    pub const fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Mutable engine.
    pub fn engine_mut(&mut self) -> &mut ExecutionEngine {
        &mut self.engine
    }

    /// The clock.
    #[must_use]
    pub const fn clock(&self) -> &ClockDriver {
        &self.clock
    }

    /// Looks up a peripheral by configured name.
    #[must_use]
    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        let space = self.engine.address_space();
        (0..space.peripheral_count())
            .map(DeviceId)
            .find(|id| space.peripheral(*id).is_some_and(|device| device.name() == name))
    }

    /// Captures the architectural state.
    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        self.engine.snapshot()
    }
}
