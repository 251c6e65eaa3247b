//! Host-visible machine state captures.

use crate::execute::ExecutionEngine;
use crate::fault::FaultCode;
use crate::state::Register;

/// One register's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterSnapshot {
    /// 32-bit view.
    pub value: i32,
    /// Full stored accumulator.
    pub accumulator: i64,
    /// Carry flag.
    pub carry: bool,
    /// Overflow flag.
    pub overflow: bool,
}

impl From<&Register> for RegisterSnapshot {
    fn from(register: &Register) -> Self {
        Self {
            value: register.get(),
            accumulator: register.accumulator(),
            carry: register.carry(),
            overflow: register.overflow(),
        }
    }
}

/// Serializable capture of the architectural state between ticks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MachineSnapshot {
    /// Ticks delivered to the engine.
    pub ticks: u64,
    /// PC `current` cell.
    pub pc_current: u32,
    /// PC `next` cell.
    pub pc_next: u32,
    /// Index of `$TARGET`.
    pub target: u8,
    /// All sixteen registers in index order.
    pub registers: Vec<RegisterSnapshot>,
    /// Fault latched by the engine, if any.
    pub latched_fault: Option<FaultCode>,
}

impl MachineSnapshot {
    /// Captures the engine's current state.
    #[must_use]
    pub fn capture(engine: &ExecutionEngine) -> Self {
        let space = engine.address_space();
        let registers = space.registers();
        Self {
            ticks: engine.tick_count(),
            pc_current: space.program_counter().current(),
            pc_next: space.program_counter().next(),
            target: registers.target_index().value(),
            registers: registers.iter().map(RegisterSnapshot::from).collect(),
            latched_fault: engine.latched_fault(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MachineSnapshot;
    use crate::api::CoreConfig;
    use crate::execute::ExecutionEngine;
    use crate::state::REGISTER_COUNT;

    #[test]
    fn capture_reflects_executed_program() {
        let mut engine = ExecutionEngine::with_ram(CoreConfig::default(), 16).expect("engine");
        engine.load_image(&[0x02, 0xF9]).expect("fits");
        engine.tick().expect("SEL");
        engine.tick().expect("INC");

        let snapshot = MachineSnapshot::capture(&engine);
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.pc_current, 1);
        assert_eq!(snapshot.pc_next, 2);
        assert_eq!(snapshot.target, 2);
        assert_eq!(snapshot.registers.len(), REGISTER_COUNT);
        assert_eq!(snapshot.registers[2].value, 1);
        assert_eq!(snapshot.latched_fault, None);
    }
}
