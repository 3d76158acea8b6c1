use std::fmt;

use crate::memory::{Address, Byte, Memory, Word, MEMORY_SIZE};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// Width of the accumulator and of every memory cell
pub const BITS: u32 = 8;

const SIGN_BIT: Byte = 0x80;

/// Status flags. Each one is only touched by the instructions that define it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags {
    /// Negative
    pub n: bool,
    /// Zero
    pub z: bool,
    /// Overflow
    pub v: bool,
    /// Carry
    pub c: bool,
    /// Borrow
    pub b: bool,
}

impl Flags {
    fn set_nz(&mut self, value: Byte) {
        self.n = value & SIGN_BIT != 0;
        self.z = value == 0;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N={}, Z={}, V={}, C={}, B={}",
            self.n as u8, self.z as u8, self.v as u8, self.c as u8, self.b as u8
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// A HLT instruction was executed
    Halted,
    /// The program counter left memory without executing HLT
    RanOffEnd,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Halted => f.write_str("halted"),
            Outcome::RanOffEnd => f.write_str("ran off the end of memory without HLT"),
        }
    }
}

/// One executed step, as recorded by [`Processor::trace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    /// Address the opcode was fetched from
    pub address: Word,
    /// Raw opcode byte
    pub opcode: Byte,
    /// Decoded class, `None` for unmapped opcodes
    pub instruction: Option<Instruction>,
    /// Operand byte of two-byte instructions
    pub operand: Option<Address>,
}

/// Emulates the AHMES CPU
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Processor {
    /// Program counter. Wider than an address so running past 255 is observable.
    pub pc: Word,
    /// Accumulator
    pub ac: Byte,
    /// Status flags
    pub flags: Flags,
    /// Set once HLT has been executed
    pub halted: bool,
}

impl Processor {
    /// Initializes a CPU with PC, AC and all flags cleared
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how the run ended, or `None` while the CPU can still fetch.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.halted {
            Some(Outcome::Halted)
        } else if self.pc as usize >= MEMORY_SIZE {
            Some(Outcome::RanOffEnd)
        } else {
            None
        }
    }

    /// Executes a single decoded instruction located at PC.
    ///
    /// `operand` is the byte following the opcode; one-byte instructions ignore it.
    pub fn execute_instruction(
        &mut self,
        instruction: Instruction,
        operand: Address,
        memory: &mut Memory,
    ) {
        match instruction {
            Instruction::NOP => {
                self.pc += 1;

                debug!("NOP");
            }
            Instruction::STA => {
                memory.write_byte(operand, self.ac);
                self.pc += 2;

                debug!("STA {}: {}", operand, self.ac);
            }
            Instruction::LDA => {
                self.ac = memory.read_byte(operand);
                self.flags.set_nz(self.ac);
                self.pc += 2;

                debug!("LDA {}: {}", operand, self.ac);
            }
            Instruction::ADD => {
                let a = self.ac;
                let b = memory.read_byte(operand);
                let sum = Word::from(a) + Word::from(b);
                let result = sum as Byte;

                self.flags.c = sum > Word::from(Byte::MAX);
                self.flags.v = add_overflows(a, b, result);
                self.ac = result;
                self.flags.set_nz(result);
                self.pc += 2;

                debug!("ADD {}: {} + {} = {}", operand, a, b, result);
            }
            Instruction::OR => {
                let value = memory.read_byte(operand);
                self.ac |= value;
                self.flags.set_nz(self.ac);
                self.pc += 2;

                debug!("OR {}: {}", operand, self.ac);
            }
            Instruction::AND => {
                let value = memory.read_byte(operand);
                self.ac &= value;
                self.flags.set_nz(self.ac);
                self.pc += 2;

                debug!("AND {}: {}", operand, self.ac);
            }
            Instruction::NOT => {
                self.ac = !self.ac;
                self.flags.set_nz(self.ac);
                self.pc += 1;

                debug!("NOT: {}", self.ac);
            }
            Instruction::SUB => {
                let a = self.ac;
                let b = memory.read_byte(operand);
                let difference = i16::from(a) - i16::from(b);
                let result = difference as Byte;

                self.flags.b = difference < 0;
                self.flags.v = sub_overflows(a, b, result);
                self.ac = result;
                self.flags.set_nz(result);
                self.pc += 2;

                debug!("SUB {}: {} - {} = {}", operand, a, b, result);
            }
            Instruction::JMP => {
                self.pc = Word::from(operand);

                debug!("JMP {}", operand);
            }
            Instruction::JN => self.branch(instruction, self.flags.n, operand),
            Instruction::JP => self.branch(instruction, !self.flags.n, operand),
            Instruction::JV => self.branch(instruction, self.flags.v, operand),
            Instruction::JNV => self.branch(instruction, !self.flags.v, operand),
            Instruction::JZ => self.branch(instruction, self.flags.z, operand),
            Instruction::JNZ => self.branch(instruction, !self.flags.z, operand),
            Instruction::JC => self.branch(instruction, self.flags.c, operand),
            Instruction::JNC => self.branch(instruction, !self.flags.c, operand),
            Instruction::JB => self.branch(instruction, self.flags.b, operand),
            Instruction::JNB => self.branch(instruction, !self.flags.b, operand),
            Instruction::SHR => {
                self.flags.c = self.ac & 0x01 != 0;
                self.ac >>= 1;
                self.flags.set_nz(self.ac);
                self.pc += 1;

                debug!("SHR: {}", self.ac);
            }
            Instruction::SHL => {
                self.flags.c = self.ac & SIGN_BIT != 0;
                self.ac <<= 1;
                self.flags.set_nz(self.ac);
                self.pc += 1;

                debug!("SHL: {}", self.ac);
            }
            Instruction::ROR => {
                let carry_in = Byte::from(self.flags.c) << 7;
                self.flags.c = self.ac & 0x01 != 0;
                self.ac = (self.ac >> 1) | carry_in;
                self.flags.set_nz(self.ac);
                self.pc += 1;

                debug!("ROR: {}", self.ac);
            }
            Instruction::ROL => {
                let carry_in = Byte::from(self.flags.c);
                self.flags.c = self.ac & SIGN_BIT != 0;
                self.ac = (self.ac << 1) | carry_in;
                self.flags.set_nz(self.ac);
                self.pc += 1;

                debug!("ROL: {}", self.ac);
            }
            Instruction::HLT => {
                self.halted = true;
                self.pc += 1;

                debug!("HLT");
            }
        }
    }

    fn branch(&mut self, instruction: Instruction, taken: bool, target: Address) {
        if taken {
            self.pc = Word::from(target);
        } else {
            self.pc += 2;
        }

        debug!("{} {}: {}", instruction, target, if taken { "taken" } else { "not taken" });
    }

    /// Runs one fetch-decode-execute step.
    ///
    /// Returns `None` without touching any state once the run has ended.
    pub fn execute(&mut self, memory: &mut Memory) -> Option<Step> {
        if self.outcome().is_some() {
            return None;
        }

        let address = self.pc;
        let opcode = memory.get(address)?;
        let mut step = Step {
            address,
            opcode,
            instruction: None,
            operand: None,
        };

        let instruction = match Instruction::decode(opcode) {
            Some(instruction) => instruction,
            None => {
                warn!("Unknown opcode {} at address {}, skipping", opcode, address);
                self.pc += 1;
                return Some(step);
            }
        };
        step.instruction = Some(instruction);

        let operand = if instruction.width() == 2 {
            match memory.get(address + 1) {
                Some(operand) => {
                    step.operand = Some(operand);
                    operand
                }
                None => {
                    warn!("{} at address {} has no operand cell", instruction, address);
                    self.pc += 2;
                    return Some(step);
                }
            }
        } else {
            0
        };

        self.execute_instruction(instruction, operand, memory);
        Some(step)
    }

    /// Runs until HLT is executed or the program counter leaves memory
    pub fn execute_until_hlt(&mut self, memory: &mut Memory) -> Outcome {
        loop {
            if let Some(outcome) = self.outcome() {
                info!("Program terminated ({}) at pc = {}", outcome, self.pc);
                return outcome;
            }
            self.execute(memory);
        }
    }

    /// Like [`Processor::execute_until_hlt`], but records every executed step
    pub fn trace(&mut self, memory: &mut Memory) -> (Outcome, Vec<Step>) {
        let mut steps = Vec::new();
        while let Some(step) = self.execute(memory) {
            steps.push(step);
        }
        (self.execute_until_hlt(memory), steps)
    }
}

/// Signed overflow of `a + b`: both operands share a sign the result lacks
fn add_overflows(a: Byte, b: Byte, result: Byte) -> bool {
    let (a, b, result) = (a & SIGN_BIT, b & SIGN_BIT, result & SIGN_BIT);
    a == b && result != a
}

/// Signed overflow of `a - b`: operand signs differ and the result sign left `a`'s
fn sub_overflows(a: Byte, b: Byte, result: Byte) -> bool {
    let (a, b, result) = (a & SIGN_BIT, b & SIGN_BIT, result & SIGN_BIT);
    a != b && result != a
}

macro_rules! instructions {
    ( $( $( #[$attr:meta] )+ $name:ident = $repr:literal , )+ ) => {
        /// The AHMES opcode classes. Each class owns a band of opcode bytes;
        /// the discriminant is the base value the assembler emits.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Instruction {
            $(
                $( #[$attr] )+
                $name = $repr,
            )+
        }

        impl Instruction {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl ::std::fmt::Display for Instruction {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

instructions! {
    /// No operation
    #[num_enum(alternatives = [1..=15])]
    NOP = 0,
    /// Store AC into memory
    /// @param address Destination cell
    #[num_enum(alternatives = [17..=31])]
    STA = 16,
    /// Load AC from memory
    /// @param address Source cell
    #[num_enum(alternatives = [33..=47])]
    LDA = 32,
    /// Add a memory cell to AC
    /// @param address Source cell
    #[num_enum(alternatives = [49..=63])]
    ADD = 48,
    /// Bitwise or of AC with a memory cell
    /// @param address Source cell
    #[num_enum(alternatives = [65..=79])]
    OR = 64,
    /// Bitwise and of AC with a memory cell
    /// @param address Source cell
    #[num_enum(alternatives = [81..=95])]
    AND = 80,
    /// Complement AC
    #[num_enum(alternatives = [97..=111])]
    NOT = 96,
    /// Subtract a memory cell from AC
    /// @param address Source cell
    #[num_enum(alternatives = [113..=127])]
    SUB = 112,
    /// Jump to an address
    /// @param address The address to jump to
    #[num_enum(alternatives = [129..=143])]
    JMP = 128,
    /// Jump if negative
    #[num_enum(alternatives = [145..=147])]
    JN = 144,
    /// Jump if positive
    #[num_enum(alternatives = [149..=151])]
    JP = 148,
    /// Jump on overflow
    #[num_enum(alternatives = [153..=155])]
    JV = 152,
    /// Jump on no overflow
    #[num_enum(alternatives = [157..=159])]
    JNV = 156,
    /// Jump if zero
    #[num_enum(alternatives = [161..=163])]
    JZ = 160,
    /// Jump if not zero
    #[num_enum(alternatives = [165..=167])]
    JNZ = 164,
    /// Jump on carry
    #[num_enum(alternatives = [169..=171])]
    JC = 168,
    /// Jump on no carry
    #[num_enum(alternatives = [173..=175])]
    JNC = 172,
    /// Jump on borrow
    #[num_enum(alternatives = [177..=179])]
    JB = 176,
    /// Jump on no borrow
    #[num_enum(alternatives = [181..=183])]
    JNB = 180,
    /// Shift AC right, bit 0 into carry
    #[num_enum(alternatives = [228, 232, 236])]
    SHR = 224,
    /// Shift AC left, bit 7 into carry
    #[num_enum(alternatives = [229, 233, 237])]
    SHL = 225,
    /// Rotate AC right through carry
    #[num_enum(alternatives = [230, 234, 238])]
    ROR = 226,
    /// Rotate AC left through carry
    #[num_enum(alternatives = [231, 235, 239])]
    ROL = 227,
    /// Stop the execution of the program
    #[num_enum(alternatives = [241..=255])]
    HLT = 240,
}

impl Instruction {
    /// Classifies a raw opcode byte, `None` if it falls outside every band
    pub fn decode(opcode: Byte) -> Option<Self> {
        Self::try_from(opcode).ok()
    }

    /// Looks up a mnemonic, ignoring case
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|instruction| instruction.name().eq_ignore_ascii_case(mnemonic))
    }

    /// Number of memory cells the instruction occupies
    pub fn width(&self) -> Word {
        match self {
            Self::NOP | Self::NOT | Self::SHR | Self::SHL | Self::ROR | Self::ROL | Self::HLT => 1,
            _ => 2,
        }
    }

    /// Whether the operand is a branch target rather than a data address
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Self::JMP
                | Self::JN
                | Self::JP
                | Self::JV
                | Self::JNV
                | Self::JZ
                | Self::JNZ
                | Self::JC
                | Self::JNC
                | Self::JB
                | Self::JNB
        )
    }
}
