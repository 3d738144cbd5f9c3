use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use sa2::{
    asm::Assembler,
    emu::{
        emulator::{EmuState, Emulator},
        machine::Machine,
        ram::{format_image, parse_image},
    },
    plat::{Register, MEMORY_SIZE},
};

/// Assembler and emulator for the SA2 8-bit CPU.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log every micro-step
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a source file into a memory image
    Asm {
        /// Assembly source file
        source: PathBuf,
        /// Destination of the memory image; printed if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the normalized intermediate form to stderr
        #[arg(long)]
        listing: bool,
    },
    /// Run a source file or memory image until it halts
    Run {
        /// Assembly source file, or a memory image with `--image`
        file: PathBuf,
        /// Treat the file as a memory image
        #[arg(long)]
        image: bool,
        /// Clock rate in Hz; runs unpaced if omitted
        #[arg(long)]
        hz: Option<f64>,
        /// Give up after this many cycles
        #[arg(long, default_value_t = 1_000_000)]
        max_cycles: u64,
        /// Start paused in the debugger
        #[arg(long)]
        debug: bool,
    },
}

fn assemble_image(path: &Path, listing: bool) -> Result<[u8; MEMORY_SIZE]> {
    let source =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut asm = Assembler::new();
    let bin = asm.assemble(&source)?;
    if listing {
        eprint!("{}", asm.intermediate());
    }
    ensure!(
        bin.len() <= MEMORY_SIZE,
        "program is {} bytes, memory holds {MEMORY_SIZE}",
        bin.len()
    );
    let mut image = [0u8; MEMORY_SIZE];
    image[..bin.len()].copy_from_slice(&bin);
    Ok(image)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Trace
    } else if args.quiet {
        LevelFilter::Warn
    } else if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    match args.command {
        Command::Asm {
            source,
            output,
            listing,
        } => {
            let image = format_image(&assemble_image(&source, listing)?);
            match output {
                Some(path) => fs::write(&path, image)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{image}"),
            }
        }
        Command::Run {
            file,
            image,
            hz,
            max_cycles,
            debug,
        } => {
            let image = if image {
                let text = fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                parse_image(&text)?
            } else {
                assemble_image(&file, false)?
            };
            let mut machine = Machine::new();
            machine.load_image(&image)?;

            let mut emu = Emulator::new(machine, hz)?.with_max_cycles(max_cycles);
            if debug {
                emu.state = EmuState::Pause;
            }
            emu.run_while_continue()?;

            log::info!("ran {} cycles", emu.cycles());
            for reg in Register::ALL {
                println!("{}={:02X}", reg, emu.machine.register(reg));
            }
            print!("{}", emu.machine.output().render());
        }
    }
    Ok(())
}
