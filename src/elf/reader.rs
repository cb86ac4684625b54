//! Bounds-checked little-endian field access over a raw byte buffer

use crate::error::ElfError;

type Result<T> = std::result::Result<T, ElfError>;

/// Little-endian accessor over an ELF image held in memory.
///
/// Every accessor fails with [`ElfError::Truncated`] instead of silently
/// reading short when the requested field would run past the end of the
/// buffer.
pub struct ElfReader<'a> {
    data: &'a [u8],
}

impl<'a> ElfReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or(ElfError::Truncated { offset, needed: 1 })
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        let bytes = self.field(offset, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        let bytes = self.field(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a NUL-terminated string starting at `offset`, scanning at most
    /// `limit` bytes. Stops at the first zero byte or at `limit`, whichever
    /// comes first; fails if the scan would run past the end of the buffer
    /// before reaching either.
    pub fn read_cstr(&self, offset: usize, limit: usize) -> Result<&'a [u8]> {
        if offset > self.data.len() {
            return Err(ElfError::Truncated { offset, needed: 1 });
        }
        let window = &self.data[offset..];
        let span = limit.min(window.len());
        match window[..span].iter().position(|&b| b == 0) {
            Some(end) => Ok(&window[..end]),
            // Hit the caller-imposed limit inside the buffer: the string is
            // everything up to the limit. Running out of buffer before the
            // limit without a terminator is a truncation.
            None if span == limit => Ok(&window[..span]),
            None => Err(ElfError::Truncated {
                offset: self.data.len(),
                needed: 1,
            }),
        }
    }

    fn field(&self, offset: usize, width: usize) -> Result<&'a [u8]> {
        if offset.checked_add(width).map_or(true, |end| end > self.data.len()) {
            return Err(ElfError::Truncated {
                offset,
                needed: width,
            });
        }
        Ok(&self.data[offset..offset + width])
    }
}
