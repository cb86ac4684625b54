//! Inspection session lifecycle
//!
//! An [`InspectSession`] ties one [`MemoryReader`] transport and one
//! [`MemoryModel`] catalog to the lifetime of a debug session. The catalog
//! lives and dies with the session; nothing here is process-wide state.
//!
//! All work is short-lived cooperative async: the only suspension points are
//! transport round trips and ELF file reads. Heap refreshes follow a
//! stage-then-swap discipline, so the previous snapshot survives any failed
//! or cancelled read.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::elf::{extract_symbols, extract_symbols_from_file};
use crate::error::{InspectError, Result};
use crate::memory::heap::decode_heap_blocks;
use crate::memory::model::{MemoryItem, MemoryModel};
use crate::memory::reader::MemoryReader;
use crate::utils::{format_address, hex_dump};

/// Location of the target-resident heap allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapTable {
    pub address: u32,
    pub size: u32,
}

/// One live inspection session over a debug transport.
pub struct InspectSession<R: MemoryReader> {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    reader: R,
    model: MemoryModel,
    heap_symbol: String,
    heap_table: Option<HeapTable>,
}

impl<R: MemoryReader> InspectSession<R> {
    pub fn new(reader: R, heap_symbol: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        info!("inspection session {} created", id);
        Self {
            id,
            created_at: Utc::now(),
            reader,
            model: MemoryModel::new(),
            heap_symbol: heap_symbol.into(),
            heap_table: None,
        }
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut MemoryModel {
        &mut self.model
    }

    /// Parse the firmware image and ingest its variable symbols. Returns the
    /// number of symbols loaded.
    pub fn load_elf(&mut self, path: &Path) -> Result<usize> {
        let symbols = extract_symbols_from_file(path)?;
        info!("loaded {} variable symbols from {}", symbols.len(), path.display());
        self.model.load_symbols(&symbols);
        Ok(symbols.len())
    }

    /// Ingest variable symbols from an in-memory ELF image.
    pub fn load_elf_bytes(&mut self, data: &[u8]) -> Result<usize> {
        let symbols = extract_symbols(data)?;
        self.model.load_symbols(&symbols);
        Ok(symbols.len())
    }

    /// Resolve the heap allocation table's address and size by evaluating
    /// `&<symbol>` and `sizeof(<symbol>)` on the target. Cached for the
    /// session once found.
    pub async fn locate_heap_table(&mut self) -> Result<HeapTable> {
        if let Some(table) = self.heap_table {
            return Ok(table);
        }
        let address = self
            .reader
            .evaluate(&format!("&{}", self.heap_symbol))
            .await?
            .ok_or_else(|| InspectError::SymbolNotFound(self.heap_symbol.clone()))?;
        let size = self
            .reader
            .evaluate(&format!("sizeof({})", self.heap_symbol))
            .await?
            .ok_or_else(|| InspectError::SymbolNotFound(self.heap_symbol.clone()))?;
        let table = HeapTable {
            address: address as u32,
            size: size as u32,
        };
        info!("heap table at 0x{:08x}, {} bytes", table.address, table.size);
        self.heap_table = Some(table);
        Ok(table)
    }

    /// Read a raw snapshot of the heap allocation table. A transport answer
    /// of "no data" is an [`InspectError::UnreadableMemory`], not an empty
    /// snapshot; the catalog is not touched here.
    pub async fn fetch_heap_snapshot(&mut self) -> Result<Vec<u8>> {
        let table = self.locate_heap_table().await?;
        match self.reader.read_memory(table.address, table.size as usize).await? {
            Some(data) => Ok(data),
            None => Err(InspectError::UnreadableMemory { address: table.address }),
        }
    }

    /// Decode a fetched snapshot and swap it into the catalog. Decoding
    /// completes before the model is mutated, so the previous heap state is
    /// never half-replaced. Returns the number of live blocks.
    pub fn apply_heap_snapshot(&mut self, data: &[u8]) -> usize {
        let blocks = decode_heap_blocks(data);
        let count = blocks.len();
        self.model.replace_heap_blocks(&blocks);
        count
    }

    /// Fetch and apply in one step.
    pub async fn refresh_heap(&mut self) -> Result<usize> {
        let snapshot = self.fetch_heap_snapshot().await?;
        Ok(self.apply_heap_snapshot(&snapshot))
    }

    /// Hex+ASCII dump of target memory, or `None` when the target returned
    /// no data for the range.
    pub async fn view_memory(&mut self, address: u32, length: usize) -> Result<Option<String>> {
        let data = self.reader.read_memory(address, length).await?;
        Ok(data.map(|bytes| hex_dump(address, &bytes)))
    }

    /// Current value of a catalog item: the first word at its address,
    /// formatted as a 32-bit hex literal. `None` when the target returned no
    /// data or less than one word.
    pub async fn item_value(&mut self, item: &MemoryItem) -> Result<Option<String>> {
        let data = self.reader.read_memory(item.address, 4).await?;
        Ok(data.and_then(|bytes| {
            let word: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
            Some(format_address(u32::from_le_bytes(word)))
        }))
    }
}

/// Periodically refresh the heap snapshot until `shutdown` flips to `true`.
///
/// Failures are swallowed per tick: one flaky read skips that refresh and
/// the next tick retries independently. A read still in flight when the
/// session shuts down is discarded rather than applied.
pub async fn poll_heap<R: MemoryReader>(
    session: Arc<Mutex<InspectSession<R>>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut session = session.lock().await;
                let snapshot = match session.fetch_heap_snapshot().await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("heap refresh skipped: {}", e);
                        continue;
                    }
                };
                // Stale-session guard: never apply a snapshot that finished
                // arriving after shutdown was requested.
                if *shutdown.borrow() {
                    debug!("discarding heap snapshot read during shutdown");
                    break;
                }
                let count = session.apply_heap_snapshot(&snapshot);
                debug!("heap refresh applied: {} blocks", count);
            }
            changed = shutdown.changed() => {
                // A dropped sender means the session is gone too.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("heap polling stopped");
}
