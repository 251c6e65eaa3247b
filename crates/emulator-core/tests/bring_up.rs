//! Bring-up parsing, MMIO registration and file-backed peripherals.

use std::fs;

use nibble32_core::{format_word, BringUpConfig, ConfigurationError, Machine, PeripheralKind};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const BASE: &str = "\
RAM: size=512
CLOCK: name=clock address=0x1000 range=8
PC: name=pc address=0x1008 range=4
CPU: name=cpu address=0x1010 range=16
";

fn assemble(extra: &str) -> Result<Machine, ConfigurationError> {
    let config = BringUpConfig::parse(&format!("{BASE}{extra}"))?;
    Machine::from_bring_up(&config)
}

#[test]
fn adjacent_claims_register() {
    let machine = assemble(
        "TIMER: name=a address=0x1020 range=12 interrupt=0 freq=1\n\
         TIMER: name=b address=0x102C range=12 interrupt=0 freq=1\n",
    )
    .expect("adjacent ranges are disjoint");
    assert!(machine.device_id("a").is_some());
    assert!(machine.device_id("b").is_some());
}

#[test]
fn overlapping_claim_names_first_shared_address_and_owner() {
    let error = assemble("TIMER: name=late address=0x100A range=2 interrupt=0 freq=1\n")
        .expect_err("overlaps the PC window");
    match error {
        ConfigurationError::OverlappingMapping { address, owner, .. } => {
            assert_eq!(address, 0x100A);
            assert_eq!(owner, "pc");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn claim_past_top_of_address_space_is_rejected() {
    let error = assemble("TIMER: name=top address=0xFFFFFFFC range=8 interrupt=0 freq=1\n")
        .expect_err("wraps");
    assert!(matches!(error, ConfigurationError::RangeWraps { .. }));
}

#[rstest]
#[case::no_ram("CLOCK: name=c address=0 range=8\nPC: name=p address=8 range=4\nCPU: name=r address=12 range=16\n", "RAM")]
#[case::no_cpu("RAM: size=16\nCLOCK: name=c address=0 range=8\nPC: name=p address=8 range=4\n", "CPU")]
fn missing_component_is_reported(#[case] text: &str, #[case] component: &'static str) {
    assert_eq!(
        BringUpConfig::parse(text),
        Err(ConfigurationError::MissingComponent(component))
    );
}

#[test]
fn timer_without_frequency_fails_assembly() {
    let error =
        assemble("TIMER: name=t address=0x1100 range=12 interrupt=0x40\n").expect_err("no freq");
    assert!(matches!(
        error,
        ConfigurationError::MissingKey { key: "freq", .. }
    ));
}

#[test]
fn peripheral_lines_keep_declaration_order() {
    let config = BringUpConfig::parse(&format!(
        "{BASE}FILE_WRITER: name=out address=0x1100 range=4\n\
         TIMER: name=t address=0x1104 range=12 interrupt=0 freq=3\n"
    ))
    .expect("parses");
    let kinds: Vec<PeripheralKind> = config.peripherals.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PeripheralKind::FileWriter, PeripheralKind::Timer]);
}

#[test]
fn file_writer_records_stored_words() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out.txt");
    let line = format!(
        "FILE_WRITER: name=out address=0x1100 range=4 path={}\n",
        out.display()
    );
    let mut machine = assemble(&line).expect("assembles");
    // LDN 0x1100; SEL $1; LDN -2; STR $0; HLT
    let image = [
        0xF0, 0x00, 0x00, 0x11, 0x00, 0x01, 0xF0, 0xFF, 0xFF, 0xFF, 0xFE, 0x20, 0xFF,
    ];
    machine.load_image(&image).expect("fits");
    machine.start();
    machine.run(Some(32)).expect("halts");
    drop(machine);

    let written = fs::read_to_string(&out).expect("output exists");
    assert_eq!(written, format_word(0xFFFF_FFFE));
    assert_eq!(written, "11111111111111111111111111111110\tFFFFFFFE\t-2\n");
}

#[test]
fn file_reader_streams_words_then_reports_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("in.bin");
    fs::write(&input, [0x00, 0x00, 0x00, 0x2A]).expect("write input");
    let line = format!(
        "FILE_READER: name=in address=0x1100 range=8 path={}\n",
        input.display()
    );
    let mut machine = assemble(&line).expect("assembles");
    // LDN 0x1100; SEL $1; LDR $0; SEL $2; LDN 0x1104; SEL $3; LDR $2; HLT
    let image = [
        0xF0, 0x00, 0x00, 0x11, 0x00, 0x01, 0x10, 0x02, 0xF0, 0x00, 0x00, 0x11, 0x04, 0x03, 0x12,
        0xFF,
    ];
    machine.load_image(&image).expect("fits");
    machine.start();
    machine.run(Some(32)).expect("halts");
    let snapshot = machine.snapshot();
    assert_eq!(snapshot.registers[1].value, 42);
    assert_eq!(snapshot.registers[3].value, 1, "end of input");
}

#[test]
fn missing_reader_file_is_a_configuration_error() {
    let error = assemble("FILE_READER: name=in address=0x1100 range=8 path=/nonexistent/in.bin\n")
        .expect_err("cannot open");
    assert!(matches!(error, ConfigurationError::DeviceIo { .. }));
}
