use crate::FaultCode;

/// Clock-level run state observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Not yet started, or stopped by the host.
    #[default]
    Stopped,
    /// Ticks are being delivered.
    Running,
    /// A halting opcode stopped the clock.
    Halted,
    /// A fatal fault is latched; no further progress is possible.
    FaultLatched(FaultCode),
}

impl RunState {
    /// Returns the currently latched fault, if this state is fault-latched.
    #[must_use]
    pub const fn latched_fault(self) -> Option<FaultCode> {
        match self {
            Self::FaultLatched(cause) => Some(cause),
            Self::Stopped | Self::Running | Self::Halted => None,
        }
    }

    /// True while ticks are being delivered.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}
