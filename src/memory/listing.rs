use std::fmt;

use crate::processor::Instruction;

use super::{Memory, Word};

/// Labelled disassembly of a program, read from address 0 up to the first HLT.
///
/// ```text
/// l0:  LDA(128)
/// l2:  JNZ(l0)
/// l4:  HLT
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Listing<'a>(pub &'a Memory);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memory = self.0;
        let mut address: Word = 0;

        while let Some(opcode) = memory.get(address) {
            let instruction = match Instruction::decode(opcode) {
                Some(instruction) => instruction,
                None => {
                    address += 1;
                    continue;
                }
            };

            if instruction.width() == 1 {
                writeln!(f, "l{}:  {}", address, instruction)?;
            } else {
                let operand = match memory.get(address + 1) {
                    Some(operand) => operand,
                    None => break, // no operand cell left
                };
                if instruction.is_jump() {
                    writeln!(f, "l{}:  {}(l{})", address, instruction, operand)?;
                } else {
                    writeln!(f, "l{}:  {}({})", address, instruction, operand)?;
                }
            }

            if instruction == Instruction::HLT {
                break;
            }
            address += instruction.width();
        }

        Ok(())
    }
}
