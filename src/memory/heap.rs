//! Heap allocation table decoding
//!
//! The firmware keeps a fixed-stride allocation table (`heap_info`) in RAM:
//! one 16-byte record per allocation, `(pointer, size, name_pointer, pad)`,
//! with a zero pointer marking the first unused slot. A raw snapshot of that
//! table read over the debug transport decodes into a list of live blocks.

use serde::Serialize;
use tracing::debug;

/// Bytes per allocation record in the target-resident table.
pub const HEAP_RECORD_STRIDE: usize = 16;

/// Bytes of each record actually decoded: pointer, size, name pointer.
const HEAP_RECORD_FIELDS: usize = 12;

/// One live heap allocation discovered on the target.
///
/// `pointer` is never zero and `size` is never zero; slots violating either
/// are not emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapBlock {
    pub pointer: u32,
    pub size: u32,
}

impl HeapBlock {
    /// Display label derived from the block address.
    pub fn label(&self) -> String {
        format!("Heap Block @0x{:x}", self.pointer)
    }
}

/// Decode a raw snapshot of the allocation table.
///
/// Walks the buffer in 16-byte strides, stopping at the first record with a
/// zero pointer or when no full record remains. Records with a nonzero
/// pointer but zero size are treated as malformed (or already freed) and
/// skipped rather than emitted.
pub fn decode_heap_blocks(data: &[u8]) -> Vec<HeapBlock> {
    let mut blocks = Vec::new();
    let mut offset = 0;
    while offset + HEAP_RECORD_FIELDS <= data.len() {
        let word = |at: usize| {
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        let pointer = word(offset);
        if pointer == 0 {
            break;
        }
        let size = word(offset + 4);
        let _name_pointer = word(offset + 8);

        if size > 0 {
            debug!("heap block at 0x{:08x}, {} bytes", pointer, size);
            blocks.push(HeapBlock { pointer, size });
        } else {
            debug!("skipping zero-size heap record at 0x{:08x}", pointer);
        }
        offset += HEAP_RECORD_STRIDE;
    }
    debug!("decoded {} heap blocks", blocks.len());
    blocks
}
