//! Shared address space: RAM byte store plus MMIO routing.

/// Big-endian word helpers over the byte store.
pub mod access;
/// Address-range map from bus addresses to device routes.
pub mod map;

pub use access::{read_u32_be, write_u32_be, WORD_ACCESS_BYTES};
pub use map::{DeviceMap, Route};

use tracing::debug;

use crate::api::{DeviceId, MmioDevice};
use crate::fault::{ConfigurationError, CoreError};
use crate::state::{ProgramCounter, RegisterFile};

/// RAM plus every bus-visible device.
///
/// Accesses go to the device owning the start address, rebased to a local
/// offset, and to RAM otherwise. A word access is never split between RAM and
/// a device.
#[derive(Debug)]
pub struct AddressSpace {
    ram: Box<[u8]>,
    map: DeviceMap,
    program_counter: ProgramCounter,
    registers: RegisterFile,
    peripherals: Vec<Box<dyn MmioDevice>>,
    sealed: bool,
}

impl AddressSpace {
    /// Builds an address space with `ram_size` zeroed bytes, mapping the
    /// register window and program counter at their claimed ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the two windows overlap or wrap.
    pub fn new(
        ram_size: u32,
        registers: RegisterFile,
        program_counter: ProgramCounter,
    ) -> Result<Self, ConfigurationError> {
        let mut map = DeviceMap::default();
        map.insert(registers.name(), registers.range(), Route::Registers)?;
        map.insert(
            program_counter.name(),
            program_counter.range(),
            Route::ProgramCounter,
        )?;
        debug!(ram_size, "address space created");

        Ok(Self {
            ram: vec![0; ram_size as usize].into_boxed_slice(),
            map,
            program_counter,
            registers,
            peripherals: Vec::new(),
            sealed: false,
        })
    }

    /// Freezes the device map. Later registrations fail.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// True once the device map is frozen.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Registers a peripheral at the range it claims.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OverlappingMapping`] when any claimed
    /// address is already owned, [`ConfigurationError::RangeWraps`], or
    /// [`ConfigurationError::MappingSealed`] once an engine owns the space.
    pub fn register_mmio(
        &mut self,
        device: Box<dyn MmioDevice>,
    ) -> Result<DeviceId, ConfigurationError> {
        if self.sealed {
            return Err(ConfigurationError::MappingSealed {
                name: device.name().to_owned(),
            });
        }
        let id = DeviceId(self.peripherals.len());
        let range = device.range();
        self.map.insert(device.name(), range, Route::Peripheral(id))?;
        debug!(name = device.name(), %range, %id, "registered mmio device");
        self.peripherals.push(device);
        Ok(id)
    }

    /// Copies a program image verbatim into RAM starting at address 0.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ImageTooLarge`] when the image exceeds RAM.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), ConfigurationError> {
        let ram = self.ram.len();
        let target = self
            .ram
            .get_mut(..image.len())
            .ok_or(ConfigurationError::ImageTooLarge {
                image: image.len(),
                ram,
            })?;
        target.copy_from_slice(image);
        debug!(bytes = image.len(), "program image loaded");
        Ok(())
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryOutOfRange`] for an unmapped address past RAM.
    pub fn read_byte(&mut self, address: u32) -> Result<u8, CoreError> {
        if let Some((route, offset)) = self.map.resolve(address) {
            return Ok(self.device_mut(route).read_byte(offset));
        }
        self.ram
            .get(address as usize)
            .copied()
            .ok_or(CoreError::MemoryOutOfRange { address, width: 1 })
    }

    /// Reads one big-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryOutOfRange`] when an unmapped word runs past RAM.
    pub fn read_integer(&mut self, address: u32) -> Result<u32, CoreError> {
        if let Some((route, offset)) = self.map.resolve(address) {
            return Ok(self.device_mut(route).read_integer(offset));
        }
        read_u32_be(&self.ram, address as usize).ok_or(CoreError::MemoryOutOfRange {
            address,
            width: WORD_ACCESS_BYTES,
        })
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryOutOfRange`] for an unmapped address past RAM.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), CoreError> {
        if let Some((route, offset)) = self.map.resolve(address) {
            self.device_mut(route).write_byte(offset, value);
            return Ok(());
        }
        let cell = self
            .ram
            .get_mut(address as usize)
            .ok_or(CoreError::MemoryOutOfRange { address, width: 1 })?;
        *cell = value;
        Ok(())
    }

    /// Writes one big-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MemoryOutOfRange`] when an unmapped word runs past RAM.
    pub fn write_integer(&mut self, address: u32, value: u32) -> Result<(), CoreError> {
        if let Some((route, offset)) = self.map.resolve(address) {
            self.device_mut(route).write_integer(offset, value);
            return Ok(());
        }
        write_u32_be(&mut self.ram, address as usize, value).ok_or(
            CoreError::MemoryOutOfRange {
                address,
                width: WORD_ACCESS_BYTES,
            },
        )
    }

    /// Delivers one clock pulse to the program counter and every peripheral.
    ///
    /// The register window is the engine's own face on the bus and never ticks.
    pub fn broadcast_tick(&mut self) {
        self.program_counter.tick();
        for device in &mut self.peripherals {
            device.tick();
        }
    }

    /// Clears every register and resets every device. RAM is kept.
    pub fn reset_devices(&mut self) {
        self.registers.clear();
        self.program_counter.reset();
        for device in &mut self.peripherals {
            device.reset();
        }
    }

    /// Takes the vector of the first pending peripheral in registration order.
    pub fn take_pending_interrupt(&mut self) -> Option<(DeviceId, u32)> {
        self.peripherals
            .iter_mut()
            .enumerate()
            .filter(|(_, device)| device.interrupt_pending())
            .find_map(|(index, device)| {
                device
                    .take_interrupt_vector()
                    .map(|vector| (DeviceId(index), vector))
            })
    }

    /// RAM size in bytes.
    #[must_use]
    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// Read-only view of RAM.
    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// The device map.
    #[must_use]
    pub const fn map(&self) -> &DeviceMap {
        &self.map
    }

    /// The program counter.
    #[must_use]
    pub const fn program_counter(&self) -> &ProgramCounter {
        &self.program_counter
    }

    /// Mutable program counter.
    pub fn program_counter_mut(&mut self) -> &mut ProgramCounter {
        &mut self.program_counter
    }

    /// The register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Mutable register file.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Peripheral registered under `id`.
    #[must_use]
    pub fn peripheral(&self, id: DeviceId) -> Option<&(dyn MmioDevice + 'static)> {
        self.peripherals.get(id.0).map(AsRef::as_ref)
    }

    /// Mutable peripheral registered under `id`.
    pub fn peripheral_mut(&mut self, id: DeviceId) -> Option<&mut (dyn MmioDevice + 'static)> {
        self.peripherals.get_mut(id.0).map(AsMut::as_mut)
    }

    /// Number of registered peripherals.
    #[must_use]
    pub fn peripheral_count(&self) -> usize {
        self.peripherals.len()
    }

    fn device_mut(&mut self, route: Route) -> &mut dyn MmioDevice {
        match route {
            Route::Registers => &mut self.registers,
            Route::ProgramCounter => &mut self.program_counter,
            Route::Peripheral(id) => self.peripherals[id.0].as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::AddressSpace;
    use crate::api::{DeviceId, MmioDevice, MmioIdentity, MmioRange};
    use crate::fault::{ConfigurationError, CoreError};
    use crate::state::{AccumulatorWidth, ProgramCounter, RegisterFile, RegisterIndex};

    #[derive(Debug, Default)]
    struct Latch {
        identity: Option<MmioIdentity>,
        last: Option<(u32, u32)>,
        ticks: u32,
        vector: Option<u32>,
    }

    impl Latch {
        fn at(start: u32, length: u32) -> Box<Self> {
            Box::new(Self {
                identity: Some(MmioIdentity::new("latch", MmioRange::new(start, length))),
                ..Self::default()
            })
        }
    }

    impl MmioDevice for Latch {
        fn name(&self) -> &str {
            "latch"
        }

        fn range(&self) -> MmioRange {
            self.identity.as_ref().map(|id| id.range).unwrap_or_default()
        }

        fn read_byte(&mut self, offset: u32) -> u8 {
            offset as u8
        }

        fn read_integer(&mut self, offset: u32) -> u32 {
            0xD000_0000 | offset
        }

        fn write_byte(&mut self, offset: u32, value: u8) {
            self.last = Some((offset, u32::from(value)));
        }

        fn write_integer(&mut self, offset: u32, value: u32) {
            self.last = Some((offset, value));
        }

        fn tick(&mut self) {
            self.ticks += 1;
        }

        fn interrupt_pending(&self) -> bool {
            self.vector.is_some()
        }

        fn take_interrupt_vector(&mut self) -> Option<u32> {
            self.vector.take()
        }
    }

    fn space(ram: u32) -> AddressSpace {
        AddressSpace::new(
            ram,
            RegisterFile::new(AccumulatorWidth::Truncated32),
            ProgramCounter::default(),
        )
        .expect("unmapped windows never overlap")
    }

    #[test]
    fn ram_words_are_big_endian() {
        let mut space = space(64);
        space.write_integer(8, 0xDEAD_BEEF).expect("in range");
        assert_eq!(space.read_byte(8), Ok(0xDE));
        assert_eq!(space.read_byte(11), Ok(0xEF));
        assert_eq!(space.read_integer(8), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn ram_accesses_past_the_end_fail() {
        let mut space = space(16);
        assert_eq!(
            space.read_integer(13),
            Err(CoreError::MemoryOutOfRange {
                address: 13,
                width: 4
            })
        );
        assert!(space.write_byte(16, 1).is_err());
        assert!(space.read_byte(15).is_ok());
        assert!(space.write_integer(12, 1).is_ok());
    }

    #[test]
    fn device_accesses_are_rebased_and_never_split() {
        let mut space = space(64);
        let id = space.register_mmio(Latch::at(0x20, 4)).expect("free range");
        assert_eq!(id, DeviceId(0));
        assert_eq!(space.read_integer(0x22), Ok(0xD000_0002));
        assert_eq!(space.read_byte(0x23), Ok(3));
        space.write_integer(0x23, 7).expect("device write");
        assert_eq!(space.read_integer(0x24), Ok(0));
        assert_eq!(space.ram()[0x20..0x28], [0; 8]);
    }

    #[test]
    fn word_straddling_into_a_device_stays_in_ram() {
        let mut space = space(64);
        space.register_mmio(Latch::at(0x20, 4)).expect("free range");
        space.write_integer(0x1E, 0x0102_0304).expect("ram write");
        assert_eq!(&space.ram()[0x1E..0x22], &[1, 2, 3, 4]);
    }

    #[test]
    fn devices_may_sit_beyond_ram() {
        let mut space = space(16);
        space
            .register_mmio(Latch::at(0xFFFF_0000, 0x100))
            .expect("high window");
        assert_eq!(space.read_integer(0xFFFF_0010), Ok(0xD000_0010));
    }

    #[test]
    fn overlapping_peripheral_is_rejected() {
        let mut space = space(16);
        space.register_mmio(Latch::at(0x100, 8)).expect("first");
        assert!(matches!(
            space.register_mmio(Latch::at(0x104, 8)),
            Err(ConfigurationError::OverlappingMapping { address: 0x104, .. })
        ));
        space.register_mmio(Latch::at(0x108, 8)).expect("adjacent");
        assert_eq!(space.peripheral_count(), 2);
    }

    #[test]
    fn register_window_and_pc_are_routed() {
        let registers = RegisterFile::new(AccumulatorWidth::Truncated32)
            .with_window(MmioIdentity::new("cpu", MmioRange::new(0x100, 64)));
        let pc = ProgramCounter::new(MmioIdentity::new("pc", MmioRange::new(0x140, 4)));
        let mut space = AddressSpace::new(16, registers, pc).expect("disjoint windows");
        space.write_integer(0x104, 77).expect("register write");
        assert_eq!(space.registers().get(RegisterIndex::from_nibble(4)).get(), 77);
        space.write_integer(0x111, 5).expect("wraps every sixteen bytes");
        assert_eq!(space.registers().get(RegisterIndex::from_nibble(1)).get(), 5);
        space.write_integer(0x140, 0x30).expect("pc write");
        assert_eq!(space.program_counter().next(), 0x30);
    }

    #[test]
    fn overlapping_windows_fail_bring_up() {
        let registers = RegisterFile::new(AccumulatorWidth::Truncated32)
            .with_window(MmioIdentity::new("cpu", MmioRange::new(0x100, 64)));
        let pc = ProgramCounter::new(MmioIdentity::new("pc", MmioRange::new(0x13C, 4)));
        assert!(AddressSpace::new(16, registers, pc).is_err());
    }

    #[test]
    fn broadcast_reaches_pc_and_peripherals() {
        let mut space = space(16);
        space.register_mmio(Latch::at(0x100, 4)).expect("free");
        space.broadcast_tick();
        space.broadcast_tick();
        assert_eq!(space.program_counter().current(), 1);
        let latch = space.peripheral(DeviceId(0)).expect("registered");
        assert!(format!("{latch:?}").contains("ticks: 2"));
    }

    #[test]
    fn first_pending_peripheral_wins() {
        let mut space = space(16);
        space.register_mmio(Latch::at(0x100, 4)).expect("free");
        let mut second = Latch::at(0x200, 4);
        second.vector = Some(0x80);
        space.register_mmio(second).expect("free");
        let mut third = Latch::at(0x300, 4);
        third.vector = Some(0x90);
        space.register_mmio(third).expect("free");

        assert_eq!(space.take_pending_interrupt(), Some((DeviceId(1), 0x80)));
        assert_eq!(space.take_pending_interrupt(), Some((DeviceId(2), 0x90)));
        assert_eq!(space.take_pending_interrupt(), None);
    }

    #[test]
    fn image_larger_than_ram_is_rejected() {
        let mut space = space(4);
        assert_eq!(
            space.load_image(&[0; 5]),
            Err(ConfigurationError::ImageTooLarge { image: 5, ram: 4 })
        );
        space.load_image(&[1, 2, 3, 4]).expect("exact fit");
        assert_eq!(space.ram(), &[1, 2, 3, 4]);
    }

    #[test]
    fn sealed_map_rejects_new_devices() {
        let mut space = space(16);
        space.register_mmio(Latch::at(0x100, 4)).expect("open map");
        space.seal();
        assert!(space.is_sealed());
        assert!(matches!(
            space.register_mmio(Latch::at(0, 4)),
            Err(ConfigurationError::MappingSealed { .. })
        ));
        assert_eq!(space.peripheral_count(), 1);
        assert_eq!(space.read_byte(0), Ok(0));
    }

    #[test]
    fn image_load_bypasses_mmio_routing() {
        let mut space = space(8);
        space.register_mmio(Latch::at(0, 8)).expect("shadow ram");
        space.load_image(&[9, 9]).expect("fits");
        assert_eq!(&space.ram()[..2], &[9, 9]);
        assert_eq!(space.read_byte(0), Ok(0));
    }

    proptest! {
        #[test]
        fn unclaimed_ram_word_round_trips(address in 0u32..252, value in any::<u32>()) {
            let mut space = space(256);
            space.write_integer(address, value).expect("in range");
            prop_assert_eq!(space.read_integer(address), Ok(value));
            for (index, byte) in value.to_be_bytes().into_iter().enumerate() {
                prop_assert_eq!(space.read_byte(address + index as u32), Ok(byte));
            }
        }
    }
}
