//! ELF32 binary decoding
//!
//! Hand-rolled decoding of the section header and symbol tables of 32-bit
//! little-endian firmware images. Only the pieces needed to recover
//! global/static data variables are implemented; program headers, relocations
//! and DWARF are deliberately not parsed.

pub mod reader;
pub mod symbols;

pub use reader::ElfReader;
pub use symbols::{extract_symbols, extract_symbols_from_file, Symbol, SymbolBinding};
