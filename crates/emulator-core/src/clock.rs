//! External tick stimulus with cooperative start/stop.

use tracing::{info, warn};

use crate::api::TickOutcome;
use crate::execute::ExecutionEngine;
use crate::fault::CoreError;
use crate::state::RunState;

/// Totals returned by [`ClockDriver::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunSummary {
    /// Ticks delivered by this call.
    pub ticks: u64,
    /// Run state when the call returned.
    pub state: RunState,
}

/// Drives an engine one tick at a time.
///
/// Stopping is cooperative: `HLT` or `stop` take effect after the tick that
/// requested them has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockDriver {
    state: RunState,
    ticks: u64,
}

impl ClockDriver {
    /// Creates a stopped clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RunState::Stopped,
            ticks: 0,
        }
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Ticks delivered by this clock.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True while ticks are being delivered.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Starts or resumes the clock. A latched fault keeps it stopped.
    pub fn start(&mut self) {
        if let RunState::FaultLatched(cause) = self.state {
            warn!(?cause, "clock cannot start with a latched fault");
            return;
        }
        self.state = RunState::Running;
    }

    /// Stops the clock after the current tick.
    pub fn stop(&mut self) {
        if self.state.is_running() {
            self.state = RunState::Stopped;
        }
    }

    /// Delivers one tick if running and reports whether the clock still runs.
    ///
    /// # Errors
    ///
    /// Propagates the engine's fatal [`CoreError`]; the clock latches it.
    pub fn step(&mut self, engine: &mut ExecutionEngine) -> Result<bool, CoreError> {
        if !self.is_running() {
            return Ok(false);
        }
        self.ticks += 1;
        match engine.tick() {
            Ok(outcome) => {
                if let TickOutcome::Halted { address } = outcome {
                    info!(ticks = self.ticks, address, "clock halted");
                    self.state = RunState::Halted;
                }
                Ok(self.is_running())
            }
            Err(error) => {
                self.state = RunState::FaultLatched(error.fault_code());
                Err(error)
            }
        }
    }

    /// Ticks until the clock stops or `limit` ticks have been delivered.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal [`CoreError`].
    pub fn run(
        &mut self,
        engine: &mut ExecutionEngine,
        limit: Option<u64>,
    ) -> Result<RunSummary, CoreError> {
        let mut ticks = 0;
        while self.is_running() && limit.is_none_or(|limit| ticks < limit) {
            self.step(engine)?;
            ticks += 1;
        }
        Ok(RunSummary {
            ticks,
            state: self.state,
        })
    }
}
