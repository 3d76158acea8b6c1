//! Builds a memory image from a listing. Every line assigns one cell:
//!
//! ```text
//! 0   32 129   LDA 129
//! 2   48 130
//! 4   HLT
//! 5   ADD 6
//! ```
//!
//! The first token is the address. A numeric opcode wins over a mnemonic;
//! a two-byte instruction takes the next number as its operand, stored in
//! the following cell. Lines that cannot be understood are dropped.

use std::borrow::Cow;
use std::error;
use std::{fmt, str::Lines};

use crate::processor::Instruction;

use super::{Address, Byte, Memory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingTokens,
    InvalidAddress,
    AddressOutOfRange { address: i64 },
    UnresolvedInstruction,
    InvalidCell,
    CellOutOfRange { value: i64 },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::MissingTokens => f.write_str("expected an address and an instruction"),
            ParseErrorKind::InvalidAddress => f.write_str("invalid address"),
            ParseErrorKind::AddressOutOfRange { address } => {
                write!(f, "memory has no address `{}`", address)
            }
            ParseErrorKind::UnresolvedInstruction => f.write_str("failed to resolve instruction"),
            ParseErrorKind::InvalidCell => f.write_str("invalid cell value"),
            ParseErrorKind::CellOutOfRange { value } => {
                write!(f, "cell value `{}` does not fit in a byte", value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    pub(crate) fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// One-based line number the error was found on
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Parses a signed decimal integer the way the listing format writes them
pub(crate) fn parse_integer(token: &str) -> Option<i64> {
    token.parse().ok()
}

/// What the tokens after the address turned out to hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Scan {
    /// Token index and value of the numeric opcode
    opcode: Option<(usize, Byte)>,
    /// Token index and upper-cased name of the first non-numeric token
    mnemonic: Option<(usize, String)>,
}

impl Scan {
    fn new(tokens: &[&str]) -> Self {
        let mut scan = Self::default();

        for (index, token) in tokens.iter().enumerate() {
            match parse_integer(token) {
                Some(value) => {
                    // a number after a known mnemonic is that mnemonic's operand
                    if scan.opcode.is_none() && scan.instruction().is_none() {
                        if let Ok(opcode) = Byte::try_from(value) {
                            scan.opcode = Some((index, opcode));
                        }
                    }
                }
                None => {
                    if scan.mnemonic.is_none() {
                        scan.mnemonic = Some((index, token.to_ascii_uppercase()));
                    }
                }
            }
        }

        scan
    }

    fn instruction(&self) -> Option<(usize, Instruction)> {
        let (index, name) = self.mnemonic.as_ref()?;
        Instruction::from_mnemonic(name).map(|instruction| (*index, instruction))
    }

    /// Token index and value of the opcode, numeric first
    fn resolve(&self) -> Option<(usize, Byte)> {
        self.opcode.or_else(|| {
            self.instruction()
                .map(|(index, instruction)| (index, instruction.into()))
        })
    }
}

/// First number after the opcode token. Values in byte range are preferred;
/// otherwise the first number is wrapped to eight bits.
fn operand_after(tokens: &[&str], position: usize) -> Option<Byte> {
    let numbers: Vec<i64> = tokens
        .iter()
        .skip(position + 1)
        .filter_map(|token| parse_integer(token))
        .collect();

    numbers
        .iter()
        .find_map(|value| Byte::try_from(*value).ok())
        .or_else(|| numbers.first().map(|value| value.rem_euclid(256) as Byte))
}

#[derive(Debug, Clone)]
pub struct Builder<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    memory: Memory,
}

impl<'a> Builder<'a> {
    /// Creates a new builder for `data`, starting from cleared memory.
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            memory: Memory::default(),
        }
    }

    /// Consumes `self` and builds the memory, dropping malformed lines.
    pub fn build(self) -> Memory {
        self.build_with_diagnostics().0
    }

    /// Consumes `self` and builds the memory, also returning why each
    /// dropped line was dropped.
    pub fn build_with_diagnostics(mut self) -> (Memory, Vec<ParseError>) {
        let mut skipped = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::warn!("skipping line: {}", err);
                skipped.push(err);
            }
        }

        (self.memory, skipped)
    }

    /// Tries to parse the next line of the listing. Each cell assignment
    /// should be located on it's own line.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?.trim();
        self.line_nr += 1;

        if line.is_empty() {
            Some(Ok(()))
        } else {
            Some(self.parse_assignment(line))
        }
    }

    /// Tries to parse line as a cell assignment.
    ///
    /// # Examples
    ///
    /// - `0 32 129 LDA 129`
    /// - `5 ADD 6`
    /// - `7 hlt`
    fn parse_assignment(&mut self, line: &str) -> Result<()> {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        if tokens.len() < 2 {
            return Err(ParseError::new(
                ParseErrorKind::MissingTokens,
                format!("`{}`", line),
                self.line_nr,
            ));
        }

        let address = parse_integer(tokens[0]).ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::InvalidAddress,
                format!("`{}` is not a number", tokens[0]),
                self.line_nr,
            )
        })?;
        let address = Address::try_from(address).map_err(|_| {
            ParseError::new::<_, &'static str>(
                ParseErrorKind::AddressOutOfRange { address },
                None,
                self.line_nr,
            )
        })?;

        let operands = &tokens[1..];
        let scan = Scan::new(operands);
        let (position, opcode) = scan.resolve().ok_or_else(|| {
            ParseError::new(
                ParseErrorKind::UnresolvedInstruction,
                match &scan.mnemonic {
                    Some((_, name)) => format!("unknown mnemonic `{}`", name),
                    None => "no opcode or mnemonic found".to_string(),
                },
                self.line_nr,
            )
        })?;

        self.memory.write_byte(address, opcode);
        log::debug!("[{}] {}: {}", self.line_nr, address, opcode);

        if matches!(Instruction::decode(opcode), Some(instruction) if instruction.width() == 1) {
            return Ok(());
        }

        if let Some(operand) = operand_after(operands, position) {
            match address.checked_add(1) {
                Some(next) => {
                    self.memory.write_byte(next, operand);
                    log::debug!("[{}] {}: {}", self.line_nr, next, operand);
                }
                None => log::debug!(
                    "[{}] operand `{}` dropped at the end of memory",
                    self.line_nr,
                    operand
                ),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use color_eyre::Result;

    #[test]
    fn parse_numeric_listing() -> Result<()> {
        let data = r#"
            0   32 128   LDA 128
            2   48 129   ADD 129
            4   16 130   STA 130
            6   240      HLT
        "#;

        let mem = Memory::from_str(data)?;

        assert_eq!(mem.read_byte(0), Instruction::LDA.into());
        assert_eq!(mem.read_byte(1), 128);
        assert_eq!(mem.read_byte(2), Instruction::ADD.into());
        assert_eq!(mem.read_byte(3), 129);
        assert_eq!(mem.read_byte(4), Instruction::STA.into());
        assert_eq!(mem.read_byte(5), 130);
        assert_eq!(mem.read_byte(6), Instruction::HLT.into());
        assert_eq!(mem.read_byte(7), 0);

        Ok(())
    }

    #[test]
    fn parse_mnemonic_fallback() -> Result<()> {
        let mem = Memory::from_str("5 ADD 6")?;

        assert_eq!(mem.read_byte(5), 48);
        assert_eq!(mem.read_byte(6), 6);

        Ok(())
    }

    #[test]
    fn parse_mnemonic_is_case_insensitive() -> Result<()> {
        let mem = Memory::from_str("0 lda 9\n2 jnz 0\n4 hlt")?;

        assert_eq!(mem.read_byte(0), Instruction::LDA.into());
        assert_eq!(mem.read_byte(1), 9);
        assert_eq!(mem.read_byte(2), Instruction::JNZ.into());
        assert_eq!(mem.read_byte(3), 0);
        assert_eq!(mem.read_byte(4), Instruction::HLT.into());

        Ok(())
    }

    #[test]
    fn parse_numeric_opcode_wins_over_mnemonic() -> Result<()> {
        let mem = Memory::from_str("0 33 7 ADD 8")?;

        assert_eq!(mem.read_byte(0), 33);
        assert_eq!(mem.read_byte(1), 7);

        Ok(())
    }

    #[test]
    fn parse_numbers_after_mnemonic_are_operands() -> Result<()> {
        // once LDA is known, 32 is its operand rather than a second opcode
        let mem = Memory::from_str("0 LDA 32 5")?;

        assert_eq!(mem.read_byte(0), Instruction::LDA.into());
        assert_eq!(mem.read_byte(1), 32);
        assert_eq!(mem.read_byte(2), 0);

        Ok(())
    }

    #[test]
    fn parse_one_byte_instruction_ignores_operand() -> Result<()> {
        let mem = Memory::from_str("10 NOT 99\n20 224 99\n30 HLT 5")?;

        assert_eq!(mem.read_byte(10), Instruction::NOT.into());
        assert_eq!(mem.read_byte(11), 0);
        assert_eq!(mem.read_byte(20), 224);
        assert_eq!(mem.read_byte(21), 0);
        assert_eq!(mem.read_byte(30), Instruction::HLT.into());
        assert_eq!(mem.read_byte(31), 0);

        Ok(())
    }

    #[test]
    fn parse_out_of_range_operand_is_wrapped() -> Result<()> {
        let mem = Memory::from_str("0 LDA 300\n2 32 -1")?;

        assert_eq!(mem.read_byte(1), 44);
        assert_eq!(mem.read_byte(3), 255);

        Ok(())
    }

    #[test]
    fn parse_operand_at_last_cell_is_dropped() -> Result<()> {
        let mem = Memory::from_str("255 JMP 3")?;

        assert_eq!(mem.read_byte(255), Instruction::JMP.into());
        assert_eq!(mem.read_byte(0), 0);

        Ok(())
    }

    #[test]
    fn parse_later_line_overwrites_operand_cell() -> Result<()> {
        let mem = Memory::from_str("0 LDA 9\n1 HLT")?;

        assert_eq!(mem.read_byte(0), Instruction::LDA.into());
        assert_eq!(mem.read_byte(1), Instruction::HLT.into());

        Ok(())
    }

    #[test]
    fn malformed_lines_are_dropped_not_fatal() -> Result<()> {
        let data = r#"
            just-a-word
            x LDA 3
            256 LDA 3
            -1 LDA 3
            4 FOO BAR
            6 1000
            0 HLT
        "#;

        let (mem, skipped) = Builder::new(data).build_with_diagnostics();

        let kinds: Vec<ParseErrorKind> = skipped.iter().map(ParseError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ParseErrorKind::MissingTokens,
                ParseErrorKind::InvalidAddress,
                ParseErrorKind::AddressOutOfRange { address: 256 },
                ParseErrorKind::AddressOutOfRange { address: -1 },
                ParseErrorKind::UnresolvedInstruction,
                ParseErrorKind::UnresolvedInstruction,
            ]
        );
        assert_eq!(skipped[0].line_nr(), 2);
        assert_eq!(mem.read_byte(0), Instruction::HLT.into());
        assert_eq!(mem.data.iter().filter(|cell| **cell != 0).count(), 1);

        Ok(())
    }

    #[test]
    fn unknown_word_before_opcode_is_ignored() -> Result<()> {
        let mem = Memory::from_str("0 label: 32 12")?;

        assert_eq!(mem.read_byte(0), 32);
        assert_eq!(mem.read_byte(1), 12);

        Ok(())
    }
}
