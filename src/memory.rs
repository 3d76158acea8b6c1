use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use color_eyre::eyre::{eyre, Result, WrapErr};

pub mod image;
pub mod listing;
pub mod parse;

pub type Byte = u8; // 1 cell
pub type Address = u8; // every cell is reachable through one byte
pub type Word = u16; // wide enough for the program counter to leave memory

/// Number of cells in the AHMES memory
pub const MEMORY_SIZE: usize = 256;

/// Emulates memory for use with the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory {
    /// The actual data of the memory
    pub data: [Byte; MEMORY_SIZE],
}

impl Default for Memory {
    /// Initializes the memory with every cell cleared
    fn default() -> Self {
        Memory {
            data: [0; MEMORY_SIZE],
        }
    }
}

impl Memory {
    /// Reads a byte from the memory
    pub fn read_byte(&self, position: Address) -> Byte {
        self.data[position as usize]
    }

    /// Writes a byte to the memory
    pub fn write_byte(&mut self, position: Address, value: Byte) {
        self.data[position as usize] = value;
    }

    /// Reads a byte at a position that may lie outside memory
    pub fn get(&self, position: Word) -> Option<Byte> {
        self.data.get(position as usize).copied()
    }

    /// Writes an array of bytes to the memory. Bytes that would land past
    /// the last cell are dropped.
    pub fn write_array(&mut self, position: Address, data: &[Byte]) {
        let start = position as usize;
        let end = (start + data.len()).min(MEMORY_SIZE);
        self.data[start..end].copy_from_slice(&data[..end - start]);
    }

    /// Builds memory from a listing file, see [`parse::Builder`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read listing `{}`", path.display()))?;

        Ok(parse::Builder::new(&data).build())
    }

    /// Loads a memory image file written by [`Memory::save_image`]
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read memory image `{}`", path.display()))?;

        image::parse(&data).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            eyre!(
                "invalid memory image `{}`:\n{}",
                path.display(),
                messages.join("\n")
            )
        })
    }

    /// Writes the memory image, one decimal cell per line
    pub fn save_image<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, image::Image(self).to_string())
            .wrap_err_with(|| format!("failed to write memory image `{}`", path.display()))
    }

    /// Row-major view of the memory, eight `address:value` cells per line
    pub fn dump(&self) -> Dump<'_> {
        Dump(self)
    }
}

impl FromStr for Memory {
    type Err = Infallible;

    /// Builds memory from listing text. Malformed lines are dropped, so this never fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse::Builder::new(s).build())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dump<'a>(&'a Memory);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, cells) in self.0.data.chunks(8).enumerate() {
            for (offset, value) in cells.iter().enumerate() {
                write!(f, "{}:{} ", index * 8 + offset, value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Writes a block of instructions directly into the memory
#[macro_export]
macro_rules! write_instructions {
    ( $mem:ident : $pos:expr => $( $byte:expr ),+ ) => {
        $mem.write_array($pos, &[
            $(
                $byte as $crate::memory::Byte,
            )+
        ]);
    };
}
