//! CLI entry point for the Nibble32 emulator binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use nibble32_core::{
    disassemble, BringUpConfig, CoreError, Machine, RunState, TraceEvent, TraceSink,
};
#[cfg(test)]
use tempfile as _;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: nibble32 <command> [options]

Commands:
  run <config> <image> [options]  Bring up a machine and clock a program image
  disasm <image>                  Print a disassembly of a program image

Run options:
  --max-ticks <n>  Stop after n ticks
  --step           Deliver one tick per line read from stdin; QUIT stops
  --trace          Print trace events to stderr
  --dump-state     Print the final machine state as JSON
  -h, --help       Show this help message

Examples:
  nibble32 run machine.cfg program.bin
  nibble32 run machine.cfg program.bin --max-ticks 1000 --dump-state
  nibble32 disasm program.bin
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(RunArgs),
    Disasm(DisasmArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    config: PathBuf,
    image: PathBuf,
    max_ticks: Option<u64>,
    step: bool,
    trace: bool,
    dump_state: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DisasmArgs {
    image: PathBuf,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => parse_run_args(args)
            .map(Command::Run)
            .map(ParseResult::Command),
        "disasm" => parse_disasm_args(args)
            .map(Command::Disasm)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut max_ticks = None;
    let mut step = false;
    let mut trace = false;
    let mut dump_state = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--max-ticks" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --max-ticks".to_string())?;
            let text = value.to_string_lossy();
            max_ticks = Some(
                text.parse::<u64>()
                    .map_err(|_| format!("invalid tick count: {text}"))?,
            );
            continue;
        }

        match arg.to_string_lossy().as_ref() {
            "--step" => step = true,
            "--trace" => trace = true,
            "--dump-state" => dump_state = true,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => paths.push(PathBuf::from(arg)),
        }
    }

    let mut paths = paths.into_iter();
    let config = paths
        .next()
        .ok_or_else(|| "missing config path".to_string())?;
    let image = paths
        .next()
        .ok_or_else(|| "missing image path".to_string())?;
    if paths.next().is_some() {
        return Err("too many paths provided".to_string());
    }

    Ok(RunArgs {
        config,
        image,
        max_ticks,
        step,
        trace,
        dump_state,
    })
}

fn parse_disasm_args(args: impl Iterator<Item = OsString>) -> Result<DisasmArgs, String> {
    let mut image: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if image.is_some() {
            return Err("multiple image paths provided".to_string());
        }
        image = Some(PathBuf::from(arg));
    }

    let image = image.ok_or_else(|| "missing image path".to_string())?;
    Ok(DisasmArgs { image })
}

/// Prints trace events to stderr as they happen.
struct StderrTrace;

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: TraceEvent) {
        eprintln!("{}", format_event(&event));
    }
}

fn format_event(event: &TraceEvent) -> String {
    match *event {
        TraceEvent::TickStarted { tick, pc, opcode } => {
            format!("[{tick:>8}] fetch {pc:#010X} -> {opcode:#04X}")
        }
        TraceEvent::InterruptServiced {
            tick,
            device,
            vector,
            return_address,
        } => format!(
            "[{tick:>8}] interrupt from {device}: vector {vector:#010X}, return {return_address:#010X}"
        ),
        TraceEvent::Halted { tick, pc } => format!("[{tick:>8}] halt at {pc:#010X}"),
        TraceEvent::Reset { tick, pc } => format!("[{tick:>8}] reset at {pc:#010X}"),
        TraceEvent::FaultRaised { tick, cause } => format!("[{tick:>8}] fault latched: {cause}"),
    }
}

fn build_machine(args: &RunArgs) -> Result<Machine, String> {
    let text = fs::read_to_string(&args.config)
        .map_err(|e| format!("failed to read {}: {e}", args.config.display()))?;
    let config = BringUpConfig::parse(&text).map_err(|e| e.to_string())?;
    let mut machine = Machine::from_bring_up(&config).map_err(|e| e.to_string())?;

    let image = fs::read(&args.image)
        .map_err(|e| format!("failed to read {}: {e}", args.image.display()))?;
    machine.load_image(&image).map_err(|e| e.to_string())?;
    info!(
        config = %args.config.display(),
        image = %args.image.display(),
        bytes = image.len(),
        "machine ready"
    );
    Ok(machine)
}

/// Delivers one tick per input line until `QUIT`, end of input, the tick
/// limit, or the clock stopping on its own.
fn step_interactively(
    machine: &mut Machine,
    max_ticks: Option<u64>,
    input: impl BufRead,
    output: &mut impl Write,
) -> Result<(), CoreError> {
    let mut delivered = 0u64;
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().eq_ignore_ascii_case("QUIT") {
            machine.stop();
            break;
        }
        if max_ticks.is_some_and(|limit| delivered >= limit) {
            machine.stop();
            break;
        }
        let running = machine.step()?;
        delivered += 1;
        let engine = machine.engine();
        let registers = engine.registers();
        if let Err(error) = writeln!(
            output,
            "tick {} pc={:#010X} {}={}",
            engine.tick_count(),
            engine.program_counter().current(),
            registers.target_index(),
            registers.target().get()
        ) {
            warn!(%error, "failed to write step output");
        }
        if !running {
            break;
        }
    }
    machine.stop();
    Ok(())
}

fn run_program(args: &RunArgs) -> Result<(), i32> {
    let mut machine = match build_machine(args) {
        Ok(machine) => machine,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    if args.trace {
        machine
            .engine_mut()
            .set_trace_sink(Some(Box::new(StderrTrace)));
    }

    machine.start();
    let result = if args.step {
        let stdin = io::stdin();
        step_interactively(
            &mut machine,
            args.max_ticks,
            stdin.lock(),
            &mut io::stdout(),
        )
    } else {
        machine.run(args.max_ticks).map(|_| ())
    };

    if args.dump_state {
        match serde_json::to_string_pretty(&machine.snapshot()) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: failed to serialize state: {e}"),
        }
    }

    match result {
        Ok(()) => {
            let state = match machine.clock().state() {
                RunState::Halted => "halted",
                RunState::Running | RunState::Stopped => "stopped",
                RunState::FaultLatched(_) => "faulted",
            };
            println!("{state} after {} ticks", machine.engine().tick_count());
            Ok(())
        }
        Err(e) => {
            error!(ticks = machine.engine().tick_count(), "run aborted");
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn run_disasm(args: &DisasmArgs) -> Result<(), i32> {
    let image = match fs::read(&args.image) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.image.display());
            return Err(1);
        }
    };

    for row in disassemble(&image, 0) {
        let text = if row.operands.is_empty() {
            row.mnemonic.clone()
        } else {
            format!("{} {}", row.mnemonic, row.operands)
        };
        println!("{:08X}: {:<15} {text}", row.address, row.hex_bytes());
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Run(args))) => match run_program(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Disasm(args))) => match run_disasm(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nibble32_core::{DeviceId, FaultCode};
    use std::ffi::OsString;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn os(args: &[&str]) -> impl Iterator<Item = OsString> {
        args.iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn halting_machine(image: &[u8]) -> Machine {
        let config = BringUpConfig::parse(
            "RAM: size=64\n\
             CLOCK: name=clock address=0x100 range=8\n\
             PC: name=pc address=0x108 range=4\n\
             CPU: name=cpu address=0x110 range=16\n",
        )
        .expect("valid config");
        let mut machine = Machine::from_bring_up(&config).expect("assembles");
        machine.load_image(image).expect("fits");
        machine.start();
        machine
    }

    #[test]
    fn parses_run_command() {
        let result = parse_run_args(os(&[
            "machine.cfg",
            "prog.bin",
            "--max-ticks",
            "500",
            "--trace",
            "--dump-state",
        ]))
        .expect("valid run args should parse");

        assert_eq!(
            result,
            RunArgs {
                config: PathBuf::from("machine.cfg"),
                image: PathBuf::from("prog.bin"),
                max_ticks: Some(500),
                step: false,
                trace: true,
                dump_state: true,
            }
        );
    }

    #[test]
    fn parses_disasm_command() {
        let result = parse_disasm_args(os(&["prog.bin"])).expect("valid disasm args");
        assert_eq!(
            result,
            DisasmArgs {
                image: PathBuf::from("prog.bin"),
            }
        );
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(os(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(os(&["unknown"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn run_requires_both_paths() {
        let error = parse_run_args(os(&["machine.cfg"])).expect_err("missing image");
        assert!(error.contains("missing image"));
    }

    #[test]
    fn run_rejects_bad_tick_count() {
        let error =
            parse_run_args(os(&["a", "b", "--max-ticks", "lots"])).expect_err("not a number");
        assert!(error.contains("invalid tick count"));
    }

    #[test]
    fn disasm_rejects_options() {
        let error = parse_disasm_args(os(&["--verbose"])).expect_err("no options");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn quit_line_stops_stepping() {
        let mut machine = halting_machine(&[0xFD, 0xFD, 0xFD, 0xFF]);
        let mut output = Vec::new();
        step_interactively(&mut machine, None, Cursor::new("\n\nQUIT\n\n"), &mut output)
            .expect("no faults");
        assert_eq!(machine.engine().tick_count(), 2);
        assert_eq!(machine.clock().state(), RunState::Stopped);
        let text = String::from_utf8(output).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("tick 1 pc=0x00000000 $0=0"));
    }

    #[test]
    fn stepping_ends_at_halt() {
        let mut machine = halting_machine(&[0xF9, 0xFF, 0xFD]);
        let mut output = Vec::new();
        step_interactively(&mut machine, None, Cursor::new("\n\n\n\n"), &mut output)
            .expect("no faults");
        assert_eq!(machine.engine().tick_count(), 2);
        assert_eq!(machine.clock().state(), RunState::Halted);
    }

    #[test]
    fn stepping_honors_tick_limit() {
        let mut machine = halting_machine(&[0xFD; 8]);
        let mut output = Vec::new();
        step_interactively(&mut machine, Some(3), Cursor::new("\n".repeat(8)), &mut output)
            .expect("no faults");
        assert_eq!(machine.engine().tick_count(), 3);
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stepping_survives_a_failing_writer() {
        let mut machine = halting_machine(&[0xFD, 0xFD, 0xFF]);
        step_interactively(&mut machine, None, Cursor::new("\n\n\n\n"), &mut ClosedPipe)
            .expect("write failures are not faults");
        assert_eq!(machine.engine().tick_count(), 3);
        assert_eq!(machine.clock().state(), RunState::Halted);
    }

    #[test]
    fn trace_lines_are_readable() {
        assert_eq!(
            format_event(&TraceEvent::TickStarted {
                tick: 3,
                pc: 0x10,
                opcode: 0xF9,
            }),
            "[       3] fetch 0x00000010 -> 0xF9"
        );
        assert_eq!(
            format_event(&TraceEvent::InterruptServiced {
                tick: 1,
                device: DeviceId(1),
                vector: 0x40,
                return_address: 0,
            }),
            "[       1] interrupt from device#1: vector 0x00000040, return 0x00000000"
        );
        assert!(format_event(&TraceEvent::FaultRaised {
            tick: 9,
            cause: FaultCode::Decode,
        })
        .starts_with("[       9] fault latched: "));
    }
}
