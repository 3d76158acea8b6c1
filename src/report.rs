use std::fmt;

use crate::memory::{Byte, Memory, Word, MEMORY_SIZE};
use crate::processor::{Flags, Outcome, Processor, BITS};

const COLUMNS: usize = 8;
const ROWS: usize = MEMORY_SIZE / COLUMNS;

/// Final machine state after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub memory: Memory,
    pub pc: Word,
    pub ac: Byte,
    pub flags: Flags,
    pub outcome: Outcome,
}

impl Report {
    /// Captures the processor registers and a copy of memory
    pub fn new(processor: &Processor, memory: &Memory, outcome: Outcome) -> Self {
        Self {
            memory: *memory,
            pc: processor.pc,
            ac: processor.ac,
            flags: processor.flags,
            outcome,
        }
    }

    /// AC read as a two's-complement number is negative
    pub fn is_negative(&self) -> bool {
        self.ac >= 0x80
    }

    /// AC holds zero
    pub fn is_zero(&self) -> bool {
        self.ac == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory after processing:")?;
        // column-major, so each column holds a contiguous block of 32 cells
        for row in 0..ROWS {
            for column in 0..COLUMNS {
                let address = column * ROWS + row;
                write!(f, "{}:{} ", address, self.memory.data[address])?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "outcome = {}", self.outcome)?;
        writeln!(f, "pc = {}", self.pc)?;
        writeln!(f, "ac = {}", self.ac)?;
        writeln!(f, "bits = {}", BITS)?;
        writeln!(f, "Flags: {}", self.flags)?;
        writeln!(
            f,
            "{}",
            if self.is_negative() { "Negative" } else { "Positive" }
        )?;
        writeln!(f, "{}", if self.is_zero() { "Zero" } else { "Non-zero" })
    }
}
