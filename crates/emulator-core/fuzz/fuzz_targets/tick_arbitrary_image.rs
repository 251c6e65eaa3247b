#![no_main]

use libfuzzer_sys::fuzz_target;
use nibble32_core::{
    disassemble, AccumulatorWidth, CoreConfig, Decoder, ExecutionEngine, ResetBehavior,
    UntakenBranch,
};

fuzz_target!(|data: &[u8]| {
    let Some((&mode, image)) = data.split_first() else {
        return;
    };

    let _ = disassemble(image, 0);
    let _ = Decoder::decode_bytes(image, 0);

    let config = CoreConfig {
        accumulator_width: if mode & 1 == 0 {
            AccumulatorWidth::Truncated32
        } else {
            AccumulatorWidth::Wide64
        },
        reset_behavior: if mode & 2 == 0 {
            ResetBehavior::FullReset
        } else {
            ResetBehavior::HaltOnly
        },
        untaken_branch: if mode & 4 == 0 {
            UntakenBranch::SkipImmediate
        } else {
            UntakenBranch::FallThroughByte
        },
    };

    let Ok(mut engine) = ExecutionEngine::with_ram(config, 256) else {
        return;
    };
    if engine.load_image(image).is_err() {
        return;
    }
    for _ in 0..1024 {
        match engine.tick() {
            Ok(outcome) if outcome.stops_clock() => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }
});
