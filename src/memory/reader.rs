//! Abstraction over the debug-adapter transport

use async_trait::async_trait;

use crate::error::Result;

/// Read access to the target's memory during a live debug session.
///
/// Implemented by the external debug transport (GDB/DAP adapter, probe
/// driver, replayed capture). Both operations distinguish "the target
/// returned no data" (`Ok(None)`) from a zero-length answer (`Ok(Some(...))`
/// with an empty buffer): the former means *unknown*, and callers must keep
/// whatever state they already had.
#[async_trait]
pub trait MemoryReader: Send {
    /// Read `length` bytes of raw target memory starting at `address`.
    async fn read_memory(&mut self, address: u32, length: usize) -> Result<Option<Vec<u8>>>;

    /// Evaluate an expression in the target context (e.g. `&heap_info`,
    /// `sizeof(heap_info)`) and return its numeric value.
    async fn evaluate(&mut self, expression: &str) -> Result<Option<u64>>;
}
