//! Error types for the memory layout inspector

use thiserror::Error;

/// Main error type for the inspector
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("ELF parse error: {0}")]
    Elf(#[from] ElfError),

    #[error("Memory read failed at 0x{address:08x}: {reason}")]
    MemoryRead { address: u32, reason: String },

    #[error("Target memory unreadable at 0x{address:08x}")]
    UnreadableMemory { address: u32 },

    #[error("Invalid memory region '{name}': 0x{start:08x}-0x{end:08x}")]
    InvalidRegion { name: String, start: u32, end: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Symbol not found on target: {0}")]
    SymbolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, InspectError>;

/// ELF decoding errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ElfError {
    #[error("Not an ELF image (bad magic)")]
    InvalidMagic,

    #[error("Unsupported ELF class: {0} (only 32-bit is supported)")]
    UnsupportedClass(u8),

    #[error("Unsupported ELF endianness: {0} (only little-endian is supported)")]
    UnsupportedEndianness(u8),

    #[error("Truncated image: need {needed} bytes at offset 0x{offset:x}")]
    Truncated { offset: usize, needed: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = InspectError::UnreadableMemory { address: 0x2000_0070 };
        assert!(error.to_string().contains("0x20000070"));

        let error = InspectError::InvalidRegion {
            name: "SRAM".to_string(),
            start: 0x2000_0000,
            end: 0x1fff_ffff,
        };
        assert!(error.to_string().contains("SRAM"));
    }

    #[test]
    fn test_elf_error_conversion() {
        let error: InspectError = ElfError::InvalidMagic.into();
        assert!(error.to_string().contains("bad magic"));

        let error: InspectError = ElfError::Truncated { offset: 0x40, needed: 16 }.into();
        assert!(error.to_string().contains("0x40"));
    }
}
