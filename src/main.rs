use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use dotmatrix::cpu::TraceStyle;
use dotmatrix::gameboy::GameBoy;
use dotmatrix::instructions::InstructionSet;
use dotmatrix::ppu::Framebuffer;

#[derive(Parser)]
struct Args {
    /// Path to the 64KB program image
    rom: Option<PathBuf>,

    /// Path to the 256-byte boot ROM overlay
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Number of instructions to run
    #[arg(long, default_value_t = 1_000_000)]
    steps: u64,

    /// Stop after this many completed frames instead of a step count
    #[arg(long)]
    frames: Option<u64>,

    /// Write the final 64KB memory map to this file
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Execution trace printed at exit: off, compact or full
    #[arg(long, default_value = "off")]
    trace: String,

    /// Print the decoded instruction tables and exit
    #[arg(long)]
    print_instructions: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.print_instructions {
        print!("{}", InstructionSet::get().render_all());
        return ExitCode::SUCCESS;
    }

    let trace = match args.trace.as_str() {
        "off" => TraceStyle::Off,
        "compact" => TraceStyle::Compact,
        "full" => TraceStyle::Full,
        other => {
            eprintln!("Unknown trace style: {other}");
            return ExitCode::FAILURE;
        }
    };

    let rom_path = match args.rom {
        Some(p) => p,
        None => {
            eprintln!("No ROM supplied");
            return ExitCode::FAILURE;
        }
    };
    let boot_path = match args.boot_rom {
        Some(p) => p,
        None => {
            eprintln!("No boot ROM supplied");
            return ExitCode::FAILURE;
        }
    };

    let mut gb = GameBoy::new(Box::new(Framebuffer::new()));
    if let Err(e) = gb.activate(&rom_path, &boot_path) {
        error!("failed to activate {}: {e}", rom_path.display());
        return ExitCode::FAILURE;
    }

    match args.frames {
        Some(frames) => {
            while gb.ppu.frames < frames {
                gb.step();
            }
            info!("ran {} frames", gb.ppu.frames);
        }
        None => {
            for _ in 0..args.steps {
                gb.step();
            }
            info!("ran {} steps", args.steps);
        }
    }

    if trace != TraceStyle::Off {
        print!("{}", gb.dump_state(trace));
    }

    if let Some(path) = args.dump {
        if let Err(e) = gb.mmu.dump_to_file(&path) {
            eprintln!("Failed to write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
