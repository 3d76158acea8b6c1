use color_eyre::eyre::Result;

use ahmes::memory::{Byte, Memory};
use ahmes::processor::Processor;
use ahmes::report::Report;
use ahmes::write_instructions;
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Cell holding the counter
const COUNTER: Byte = 128;
/// Cell holding the constant one
const ONE: Byte = 129;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Debug).init()?; // logging

    let mut mem = Memory::default();
    let mut cpu = Processor::new();

    use ahmes::processor::Instruction::*;
    write_instructions!(mem : 0 =>
        LDA,
        COUNTER,
        SUB,
        ONE,
        STA,
        COUNTER,
        JNZ,
        0,
        HLT
    );
    mem.write_byte(COUNTER, 10);
    mem.write_byte(ONE, 1);

    let outcome = cpu.execute_until_hlt(&mut mem);
    print!("{}", Report::new(&cpu, &mem, outcome));

    Ok(())
}
