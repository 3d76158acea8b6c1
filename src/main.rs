use std::fs;
use std::path::{Path, PathBuf};

use ahmes::memory::listing::Listing;
use ahmes::memory::Memory;
use ahmes::processor::Processor;
use ahmes::report::Report;
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// AHMES assembler and simulator
#[derive(Debug, Parser)]
#[command(name = "ahmes", version)]
struct Args {
    /// More logging, repeat for instruction traces
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Builds a memory image from a listing
    Assemble {
        /// Listing to assemble
        listing: PathBuf,

        /// Memory image to write
        #[arg(short, long, default_value = "mem.txt")]
        output: PathBuf,

        /// Also write a labelled disassembly of the program
        #[arg(long = "listing", value_name = "FILE")]
        disassembly: Option<PathBuf>,
    },
    /// Runs a memory image and prints the final state
    Run {
        /// Memory image to execute
        #[arg(default_value = "mem.txt")]
        image: PathBuf,
    },
    /// Assembles a listing, writes the image and runs it
    Exec {
        /// Listing to assemble
        listing: PathBuf,

        /// Memory image to write
        #[arg(short, long, default_value = "mem.txt")]
        output: PathBuf,
    },
}

impl Args {
    fn level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Error,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }
}

fn assemble(listing: &Path, output: &Path, disassembly: Option<&Path>) -> Result<Memory> {
    log::info!("Assembling {}", listing.display());
    let memory = Memory::from_file(listing)?;
    memory.save_image(output)?;

    if let Some(path) = disassembly {
        fs::write(path, Listing(&memory).to_string())
            .wrap_err_with(|| format!("failed to write disassembly `{}`", path.display()))?;
    }

    Ok(memory)
}

fn run(mut memory: Memory) {
    println!("Memory before processing:");
    print!("{}", memory.dump());
    println!();

    let mut cpu = Processor::new();
    let outcome = cpu.execute_until_hlt(&mut memory);

    print!("{}", Report::new(&cpu, &memory, outcome));
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    let args = Args::parse();
    SimpleLogger::new().with_level(args.level()).env().init()?; // logging

    match &args.command {
        Command::Assemble {
            listing,
            output,
            disassembly,
        } => {
            assemble(listing, output, disassembly.as_deref())?;
        }
        Command::Run { image } => run(Memory::load_image(image)?),
        Command::Exec { listing, output } => run(assemble(listing, output, None)?),
    }

    Ok(())
}
