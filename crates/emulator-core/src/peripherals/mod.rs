//! Concrete MMIO peripherals.

/// 64-bit tick counter.
pub mod cycle_counter;
/// Streaming file input.
pub mod file_reader;
/// Line-oriented value output.
pub mod file_writer;
/// Interval timer with interrupt.
pub mod timer;

pub use cycle_counter::CycleCounter;
pub use file_reader::{FileReader, READER_DATA_OFFSET, READER_EOF_OFFSET};
pub use file_writer::{format_word, FileWriter};
pub use timer::{Timer, TIMER_COUNT_OFFSET, TIMER_ENABLED_OFFSET, TIMER_FREQ_OFFSET};
