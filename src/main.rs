use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use miette::{bail, IntoDiagnostic, NamedSource, Report, Result};

use i8085::{catalog, disassemble, env, output, Assembler, Cpu, HALT_OPCODE};

/// i8085 is an assembler and step-by-step emulator for the Intel 8085.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.asm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.asm` or binary `.bin` file to `HLT` and print the final state
    Run(RunOptions),
    /// Run one instruction at a time, printing every change it makes
    Trace(RunOptions),
    /// Create binary `.bin` file to run later
    Compile {
        /// `.asm` file to compile
        name: PathBuf,
        /// Destination to output .bin file
        dest: Option<PathBuf>,
        /// Address the program will be loaded at
        #[arg(short, long, value_parser = parse_address, default_value = "0")]
        origin: u16,
    },
    /// Check `.asm` files without running or outputting binary
    Check {
        /// Files or glob patterns to check
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Print the instructions of a `.asm` or `.bin` file
    Disasm {
        /// File to disassemble
        name: PathBuf,
        /// Address the program will be loaded at
        #[arg(short, long, value_parser = parse_address, default_value = "0")]
        origin: u16,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
    },
}

#[derive(ClapArgs)]
struct RunOptions {
    /// `.asm` or `.bin` file to run
    name: PathBuf,
    /// Address the program is loaded and started at
    #[arg(short, long, value_parser = parse_address, default_value = "0")]
    origin: u16,
    /// Bytes to place in memory before running, eg. `3000h=12,01,05`
    #[arg(short, long, value_parser = parse_patch)]
    data: Vec<MemoryPatch>,
    /// Memory to print after running, eg. `3000h:10`
    #[arg(long, value_parser = parse_range)]
    dump: Vec<MemoryRange>,
    /// Maximum number of instructions to execute
    #[arg(short, long)]
    limit: Option<usize>,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
}

#[derive(Clone)]
struct MemoryPatch {
    addr: u16,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct MemoryRange {
    addr: u16,
    len: usize,
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(i8085::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run(opts) => run(&opts, false),
            Command::Trace(opts) => run(&opts, true),
            Command::Compile { name, dest, origin } => {
                file_message(Green, "Assembling", &name);
                let program = load(&name, origin)?;
                message(Green, "Finished", &format!("emit {} bytes", program.len()));

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("bin"));
                fs::write(&out_file_name, &program).into_diagnostic()?;
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { patterns } => check(&patterns),
            Command::Disasm {
                name,
                origin,
                minimal,
            } => {
                output::set_minimal(minimal);
                let program = load(&name, origin)?;
                for line in disassemble(&program, origin) {
                    print!("{}", output::listing(line.address, &line.text));
                    if let (false, Some(description)) = (minimal, line.description) {
                        println!("      {}", description.dimmed());
                    }
                }
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(
            &RunOptions {
                name: path,
                origin: 0,
                data: Vec::new(),
                dump: Vec::new(),
                limit: None,
                minimal: false,
            },
            false,
        )
    } else {
        println!("\n~ i8085 v{VERSION} ~");
        println!("{}", LOGO.truecolor(110, 190, 255).bold());
        println!("{SHORT_INFO}");
        std::process::exit(0);
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(opts: &RunOptions, trace: bool) -> Result<()> {
    use MsgColor::*;
    file_message(Green, "Assembling", &opts.name);
    let program = load(&opts.name, opts.origin)?;
    output::set_minimal(opts.minimal);

    let mut cpu = Cpu::new();
    cpu.load(opts.origin, &program);
    for patch in &opts.data {
        cpu.set_memory(patch.addr, &patch.bytes);
    }

    if trace || env::is_trace_enabled() {
        cpu.subscribe(|event| print!("{}", output::event(event)));
    }

    let limit = opts.limit.or_else(env::step_limit).unwrap_or(usize::MAX);
    message(Green, "Running", "emitted binary");

    let mut steps = 0;
    while steps < limit && !cpu.is_stopped() {
        if trace {
            let pc = cpu.pc();
            let text = catalog()
                .decode(&cpu.memory()[pc as usize..])
                .map(|decoded| decoded.to_string())
                .unwrap_or_else(|| format!("DB {:02X}h", cpu.read(pc)));
            print!("{}", output::listing(pc, &text));
        }
        cpu.step()?;
        steps += 1;
    }

    print!("{}", output::registers(&cpu));
    for range in &opts.dump {
        print!("{}", output::memory(&cpu, range.addr, range.len));
    }

    if cpu.read(cpu.pc()) == HALT_OPCODE {
        message(Green, "Halted", &format!("at {:04X}h after {steps} steps", cpu.pc()));
    } else if cpu.is_stopped() {
        message(Cyan, "Stopped", "end of memory");
    } else {
        message(Red, "Stopped", &format!("step limit of {limit} reached"));
    }
    file_message(Green, "Completed", &opts.name);
    Ok(())
}

fn check(patterns: &[String]) -> Result<()> {
    use MsgColor::*;
    let mut checked = 0;
    let mut failed = 0;
    for pattern in patterns {
        for entry in glob::glob(pattern).into_diagnostic()? {
            let name = entry.into_diagnostic()?;
            file_message(Green, "Checking", &name);
            checked += 1;
            match load(&name, 0) {
                Ok(_) => message(Green, "Success", "no errors found!"),
                Err(report) => {
                    failed += 1;
                    eprintln!("{report:?}");
                }
            }
        }
    }
    if checked == 0 {
        bail!("No files matched the given patterns.");
    }
    if failed > 0 {
        bail!("{failed} of {checked} file(s) failed to assemble.");
    }
    Ok(())
}

/// Assemble a `.asm` file or read a `.bin` file as-is.
fn load(name: &Path, origin: u16) -> Result<Vec<u8>> {
    let Some(ext) = name.extension().and_then(|ext| ext.to_str()) else {
        bail!("File has no extension. Exiting...");
    };
    match ext {
        "bin" => fs::read(name).into_diagnostic(),
        "asm" => {
            let contents = fs::read_to_string(name).into_diagnostic()?;
            match Assembler::with_origin(origin).compile(&contents) {
                Ok(result) => Ok(result.bytes),
                Err(err) => Err(Report::new(err).with_source_code(NamedSource::new(
                    name.display().to_string(),
                    contents,
                ))),
            }
        }
        _ => bail!("File has unknown extension. Exiting..."),
    }
}

fn parse_address(text: &str) -> Result<u16, String> {
    i8085::parse_literal(&text.to_lowercase()).map_err(|err| err.to_string())
}

fn parse_patch(text: &str) -> Result<MemoryPatch, String> {
    let (addr, bytes) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=BYTE,BYTE,... but found `{text}`"))?;
    let bytes = bytes
        .split(',')
        .map(|byte| i8085::parse8(&byte.trim().to_lowercase()).map_err(|err| err.to_string()))
        .collect::<Result<_, _>>()?;
    Ok(MemoryPatch {
        addr: parse_address(addr.trim())?,
        bytes,
    })
}

fn parse_range(text: &str) -> Result<MemoryRange, String> {
    let (addr, len) = text.split_once(':').unwrap_or((text, "1"));
    let len = parse_address(len.trim())?;
    Ok(MemoryRange {
        addr: parse_address(addr.trim())?,
        len: len as usize,
    })
}

const LOGO: &str = r#"
  _  ___   ___  ___ ___
 (_)( _ ) / _ \( _ ) __|
 | |/ _ \| (_) / _ \__ \
 |_|\___/ \___/\___/___/"#;

const SHORT_INFO: &str = r"
Welcome to i8085, an assembler and step-by-step emulator
for the Intel 8085 microprocessor.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
