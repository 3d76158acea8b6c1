use color_eyre::eyre::Result;

use ahmes::memory::listing::Listing;
use ahmes::memory::Memory;
use ahmes::processor::Processor;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().env().init()?; // logging

    let mut mem = Memory::from_file("demos/programs/multiply.txt")?;
    print!("{}", Listing(&mem));

    let mut cpu = Processor::new();
    let outcome = cpu.execute_until_hlt(&mut mem);
    println!("{}: 7 * 6 = {}", outcome, mem.read_byte(130));

    Ok(())
}
