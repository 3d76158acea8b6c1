//! The flat memory image handed from the assembler to the interpreter:
//! exactly one decimal cell value per line, in address order.

use std::fmt;

use super::parse::{parse_integer, ParseError, ParseErrorKind};
use super::{Byte, Memory, MEMORY_SIZE};

/// Renders memory in image format
#[derive(Debug, Clone, Copy)]
pub struct Image<'a>(pub &'a Memory);

impl fmt::Display for Image<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in self.0.data.iter() {
            writeln!(f, "{}", value)?;
        }
        Ok(())
    }
}

/// Reads an image. Blank lines leave their cell cleared and lines past the
/// last cell are ignored.
///
/// # Errors
///
/// Every line holding something other than a byte value is reported.
pub fn parse(data: &str) -> Result<Memory, Vec<ParseError>> {
    let mut memory = Memory::default();
    let mut errors = Vec::new();

    for (index, line) in data.lines().take(MEMORY_SIZE).enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let line_nr = index + 1;
        match parse_integer(line) {
            Some(value) => match Byte::try_from(value) {
                Ok(value) => memory.data[index] = value,
                Err(_) => errors.push(ParseError::new::<_, &'static str>(
                    ParseErrorKind::CellOutOfRange { value },
                    None,
                    line_nr,
                )),
            },
            None => errors.push(ParseError::new(
                ParseErrorKind::InvalidCell,
                format!("`{}`", line),
                line_nr,
            )),
        }
    }

    if errors.is_empty() {
        Ok(memory)
    } else {
        for err in &errors {
            log::error!("{}", err);
        }
        Err(errors)
    }
}
