//! Deterministic trace fingerprint used for cross-host comparison.

use std::cell::Cell;
use std::rc::Rc;

use nibble32_core::{BringUpConfig, Machine, RunState, TraceEvent, TraceSink};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use tempfile as _;
use thiserror as _;
use tracing as _;

const BRING_UP: &str = "\
RAM: size=256
CLOCK: name=clock address=0x1000 range=8
PC: name=pc address=0x1008 range=4
CPU: name=cpu address=0x1010 range=16
TIMER: name=timer address=0x1100 range=12 interrupt=0x20 freq=7 enabled=true
";

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

struct FingerprintSink(Rc<Cell<u64>>);

impl TraceSink for FingerprintSink {
    fn on_event(&mut self, event: TraceEvent) {
        let mut hash = self.0.get();
        match event {
            TraceEvent::TickStarted { tick, pc, opcode } => {
                hash_bytes(&mut hash, &[0x10, opcode]);
                hash_bytes(&mut hash, &tick.to_le_bytes());
                hash_bytes(&mut hash, &pc.to_le_bytes());
            }
            TraceEvent::InterruptServiced {
                tick,
                device,
                vector,
                return_address,
            } => {
                hash_bytes(&mut hash, &[0x11]);
                hash_bytes(&mut hash, &tick.to_le_bytes());
                hash_bytes(&mut hash, &device.0.to_le_bytes());
                hash_bytes(&mut hash, &vector.to_le_bytes());
                hash_bytes(&mut hash, &return_address.to_le_bytes());
            }
            TraceEvent::Halted { tick, pc } | TraceEvent::Reset { tick, pc } => {
                hash_bytes(&mut hash, &[0x12]);
                hash_bytes(&mut hash, &tick.to_le_bytes());
                hash_bytes(&mut hash, &pc.to_le_bytes());
            }
            TraceEvent::FaultRaised { tick, cause } => {
                hash_bytes(&mut hash, &[0x13, cause.as_u8()]);
                hash_bytes(&mut hash, &tick.to_le_bytes());
            }
        }
        self.0.set(hash);
    }
}

fn fingerprint() -> String {
    let config = BringUpConfig::parse(BRING_UP).expect("bring-up should parse");
    let mut machine = Machine::from_bring_up(&config).expect("machine should assemble");

    // Main loop counts $0 up; the handler at 0x20 bumps $1 and resumes.
    let mut image = vec![0u8; 0x30];
    image[..6].copy_from_slice(&[0xF9, 0xF2, 0x00, 0x00, 0x00, 0x00]);
    image[0x20..0x23].copy_from_slice(&[0x01, 0xF9, 0x00]);
    image[0x23] = 0x3F;
    machine.load_image(&image).expect("image should fit");

    let hash = Rc::new(Cell::new(0xcbf2_9ce4_8422_2325_u64));
    machine
        .engine_mut()
        .set_trace_sink(Some(Box::new(FingerprintSink(Rc::clone(&hash)))));
    machine.start();
    let summary = machine.run(Some(500)).expect("run should not fault");
    assert_eq!(summary.state, RunState::Running);

    let mut hash = hash.get();
    let snapshot = machine.snapshot();
    hash_bytes(&mut hash, &snapshot.ticks.to_le_bytes());
    hash_bytes(&mut hash, &snapshot.pc_current.to_le_bytes());
    hash_bytes(&mut hash, &snapshot.pc_next.to_le_bytes());
    hash_bytes(&mut hash, &[snapshot.target]);
    for register in &snapshot.registers {
        hash_bytes(&mut hash, &register.accumulator.to_le_bytes());
        hash_bytes(&mut hash, &[u8::from(register.carry), u8::from(register.overflow)]);
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
