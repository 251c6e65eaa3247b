//! Integration tests for the nibble32 CLI.

use nibble32_core as _;
use serde_json as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing as _;
use tracing_subscriber as _;

const CONFIG: &str = "\
RAM: size=256
CLOCK: name=clock address=0x1000 range=8
PC: name=pc address=0x1008 range=4
CPU: name=cpu address=0x1010 range=64
";

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("nibble32")
}

fn write_inputs(dir: &Path, config: &str, image: &[u8]) -> (PathBuf, PathBuf) {
    let config_path = dir.join("machine.cfg");
    let image_path = dir.join("program.bin");
    fs::write(&config_path, config).unwrap();
    fs::write(&image_path, image).unwrap();
    (config_path, image_path)
}

#[test]
fn run_halts_and_dumps_state() {
    let temp_dir = tempfile::tempdir().unwrap();
    // LDN 5; INC; HLT
    let (config, image) = write_inputs(
        temp_dir.path(),
        CONFIG,
        &[0xF0, 0x00, 0x00, 0x00, 0x05, 0xF9, 0xFF],
    );

    let output = Command::new(binary_path())
        .args([
            "run",
            config.to_str().unwrap(),
            image.to_str().unwrap(),
            "--dump-state",
        ])
        .output()
        .expect("failed to run nibble32");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("\"ticks\": 3"));
    assert!(stdout.contains("\"value\": 6"));
    assert!(stdout.contains("halted after 3 ticks"));
}

#[test]
fn run_stops_at_tick_limit() {
    let temp_dir = tempfile::tempdir().unwrap();
    // J 0x00000000
    let (config, image) =
        write_inputs(temp_dir.path(), CONFIG, &[0xF2, 0x00, 0x00, 0x00, 0x00]);

    let output = Command::new(binary_path())
        .args([
            "run",
            config.to_str().unwrap(),
            image.to_str().unwrap(),
            "--max-ticks",
            "50",
        ])
        .output()
        .expect("failed to run nibble32");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("stopped after 50 ticks"));
}

#[test]
fn overlapping_config_exits_with_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_text = CONFIG.replace("address=0x1008", "address=0x1004");
    let (config, image) = write_inputs(temp_dir.path(), &config_text, &[0xFF]);

    let output = Command::new(binary_path())
        .args(["run", config.to_str().unwrap(), image.to_str().unwrap()])
        .output()
        .expect("failed to run nibble32");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error:"));
}

#[test]
fn fatal_fault_exits_with_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_text = CONFIG.replace("size=256", "size=2");
    let (config, image) = write_inputs(temp_dir.path(), &config_text, &[0xFD, 0xFD]);

    let status = Command::new(binary_path())
        .args(["run", config.to_str().unwrap(), image.to_str().unwrap()])
        .stderr(Stdio::null())
        .status()
        .expect("failed to run nibble32");

    assert_eq!(status.code(), Some(1));
}

#[test]
fn step_mode_quits_on_command() {
    let temp_dir = tempfile::tempdir().unwrap();
    let (config, image) = write_inputs(temp_dir.path(), CONFIG, &[0xFD; 16]);

    let mut child = Command::new(binary_path())
        .args([
            "run",
            config.to_str().unwrap(),
            image.to_str().unwrap(),
            "--step",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run nibble32");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"\n\n\nQUIT\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("tick 3 pc=0x00000002"));
    assert!(stdout.contains("stopped after 3 ticks"));
}

#[test]
fn disasm_prints_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = temp_dir.path().join("program.bin");
    fs::write(&image, [0x03, 0x83, 0xF2, 0x00, 0x00, 0x00, 0x10, 0xFF]).unwrap();

    let output = Command::new(binary_path())
        .args(["disasm", image.to_str().unwrap()])
        .output()
        .expect("failed to run nibble32");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("SEL $3"));
    assert!(lines[2].starts_with("00000002: F2 00 00 00 10"));
    assert!(lines[2].ends_with("J 0x00000010"));
}

#[test]
fn help_flag_prints_usage() {
    let output = Command::new(binary_path())
        .arg("--help")
        .output()
        .expect("failed to run nibble32");

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("Usage: nibble32"));
}
