//! The memory item catalog
//!
//! Owns every item discovered for the current debug session, keyed by a
//! deterministic id so re-ingesting the same ELF or heap snapshot is a
//! stable no-op. Consumers get read-only views; gaps are synthesized during
//! segmentation and never stored here.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{MemoryRegion, RegionConfig};
use crate::elf::{Symbol, SymbolBinding};
use crate::error::Result;
use crate::memory::heap::HeapBlock;
use crate::memory::segment::{segment_region, EmptyRegionPolicy, Segment};
use crate::utils::format_size;

/// Per-kind payload of a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Region { children: Vec<MemoryItem> },
    Peripheral,
    Variable { binding: SymbolBinding, section_index: u16 },
    HeapBlock,
    Gap,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Region { .. } => "region",
            ItemKind::Peripheral => "peripheral",
            ItemKind::Variable { .. } => "variable",
            ItemKind::HeapBlock => "heap_block",
            ItemKind::Gap => "gap",
        }
    }
}

/// One entry of the memory map: a variable, heap block, peripheral window,
/// synthesized gap, or a region parent holding children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryItem {
    pub id: String,
    pub name: String,
    pub address: u32,
    pub size: u32,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl MemoryItem {
    pub fn variable(symbol: &Symbol) -> Self {
        Self {
            id: format!("var_{}", symbol.name),
            name: symbol.name.clone(),
            address: symbol.address,
            size: symbol.size,
            kind: ItemKind::Variable {
                binding: symbol.binding,
                section_index: symbol.section_index,
            },
        }
    }

    pub fn heap_block(block: &HeapBlock) -> Self {
        Self {
            id: format!("heap_{:08x}", block.pointer),
            name: block.label(),
            address: block.pointer,
            size: block.size,
            kind: ItemKind::HeapBlock,
        }
    }

    pub fn peripheral(name: &str, address: u32, size: u32) -> Self {
        Self {
            id: format!("periph_{:08x}", address),
            name: name.to_string(),
            address,
            size,
            kind: ItemKind::Peripheral,
        }
    }

    pub fn gap(address: u32, size: u32) -> Self {
        Self {
            id: format!("gap_{:08x}", address),
            name: "Unused".to_string(),
            address,
            size,
            kind: ItemKind::Gap,
        }
    }

    pub fn region(region: &MemoryRegion, children: Vec<MemoryItem>) -> Self {
        Self {
            id: format!("region_{}", region.name.to_lowercase()),
            name: format!("{} ({})", region.name, format_size(region.size())),
            address: region.start,
            // A full 4 GiB region does not fit a u32 byte count; clamp.
            size: u32::try_from(region.size()).unwrap_or(u32::MAX),
            kind: ItemKind::Region { children },
        }
    }

    /// Exclusive end of the item's span.
    pub fn end(&self) -> u64 {
        self.address as u64 + self.size as u64
    }
}

/// Catalog of memory items for one debug session.
///
/// Insertion order is irrelevant; queries re-sort by address. Every
/// mutating operation raises exactly one change notification, after the
/// mutation is complete, so observers always see a consistent snapshot.
#[derive(Debug)]
pub struct MemoryModel {
    items: HashMap<String, MemoryItem>,
    generation: watch::Sender<u64>,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryModel {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            items: HashMap::new(),
            generation,
        }
    }

    /// Observe catalog changes: the watched value is a generation counter
    /// bumped once per completed mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn notify(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Upsert one `variable` item per extracted symbol. Items are keyed by
    /// symbol name, so re-loading the same ELF changes nothing; items of
    /// other kinds are left untouched.
    pub fn load_symbols(&mut self, symbols: &[Symbol]) {
        for symbol in symbols {
            let item = MemoryItem::variable(symbol);
            self.items.insert(item.id.clone(), item);
        }
        debug!("catalog now holds {} items after symbol load", self.items.len());
        self.notify();
    }

    /// Replace the entire heap snapshot: every existing `heap_block` item is
    /// removed, then the new batch is inserted. Callers stage (decode) the
    /// batch fully before calling, so a failed read never half-applies.
    pub fn replace_heap_blocks(&mut self, blocks: &[HeapBlock]) {
        self.items
            .retain(|_, item| !matches!(item.kind, ItemKind::HeapBlock));
        for block in blocks {
            let item = MemoryItem::heap_block(block);
            self.items.insert(item.id.clone(), item);
        }
        debug!("heap snapshot replaced: {} blocks", blocks.len());
        self.notify();
    }

    /// Insert peripheral window items (fixed register banks from the target
    /// description). Keyed by base address.
    pub fn add_peripherals(&mut self, peripherals: &[(String, u32, u32)]) {
        for (name, address, size) in peripherals {
            let item = MemoryItem::peripheral(name, *address, *size);
            self.items.insert(item.id.clone(), item);
        }
        self.notify();
    }

    pub fn item(&self, id: &str) -> Option<&MemoryItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count_of(&self, kind_name: &str) -> usize {
        self.items
            .values()
            .filter(|item| item.kind.name() == kind_name)
            .count()
    }

    /// All items, sorted ascending by address.
    pub fn items_sorted(&self) -> Vec<&MemoryItem> {
        let mut items: Vec<_> = self.items.values().collect();
        items.sort_by_key(|item| item.address);
        items
    }

    /// Bucket the catalog into the configured regions: one `region` parent
    /// per configured range, children sorted by address. Items outside every
    /// configured region are omitted.
    pub fn region_tree(&self, config: &RegionConfig) -> Vec<MemoryItem> {
        config
            .regions()
            .iter()
            .map(|region| {
                let mut children: Vec<MemoryItem> = self
                    .items
                    .values()
                    .filter(|item| region.contains(item.address))
                    .cloned()
                    .collect();
                children.sort_by_key(|item| item.address);
                MemoryItem::region(region, children)
            })
            .collect()
    }

    /// Segment one configured region over the catalog's current items.
    pub fn segment_for(
        &self,
        region: &MemoryRegion,
        policy: EmptyRegionPolicy,
    ) -> Result<Option<Segment>> {
        let items: Vec<MemoryItem> = self
            .items
            .values()
            .filter(|item| region.contains(item.address))
            .cloned()
            .collect();
        segment_region(region, &items, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, address: u32, size: u32) -> Symbol {
        Symbol {
            name: name.to_string(),
            address,
            size,
            binding: SymbolBinding::Global,
            section_index: 3,
        }
    }

    fn sram() -> MemoryRegion {
        MemoryRegion::new("SRAM", 0x2000_0000, 0x2000_7fff).unwrap()
    }

    #[test]
    fn test_load_symbols_is_idempotent() {
        let mut model = MemoryModel::new();
        let symbols = vec![symbol("counter", 0x2000_0010, 4), symbol("buffer", 0x2000_0020, 64)];
        model.load_symbols(&symbols);
        assert_eq!(model.len(), 2);
        model.load_symbols(&symbols);
        assert_eq!(model.len(), 2);
        assert_eq!(model.item("var_counter").unwrap().address, 0x2000_0010);
    }

    #[test]
    fn test_replace_heap_blocks_full_replace() {
        let mut model = MemoryModel::new();
        model.load_symbols(&[symbol("counter", 0x2000_0010, 4)]);
        model.replace_heap_blocks(&[
            HeapBlock { pointer: 0x2000_0100, size: 32 },
            HeapBlock { pointer: 0x2000_0200, size: 16 },
        ]);
        assert_eq!(model.count_of("heap_block"), 2);

        model.replace_heap_blocks(&[HeapBlock { pointer: 0x2000_0300, size: 8 }]);
        assert_eq!(model.count_of("heap_block"), 1);
        assert!(model.item("heap_20000100").is_none());
        // Variables survive a heap replace.
        assert_eq!(model.count_of("variable"), 1);
    }

    #[test]
    fn test_replace_heap_blocks_empty_twice() {
        let mut model = MemoryModel::new();
        model.replace_heap_blocks(&[]);
        model.replace_heap_blocks(&[]);
        assert_eq!(model.count_of("heap_block"), 0);
    }

    #[test]
    fn test_one_notification_per_mutation() {
        let mut model = MemoryModel::new();
        let mut changes = model.subscribe();
        assert_eq!(*changes.borrow_and_update(), 0);

        model.load_symbols(&[symbol("a", 0x2000_0000, 4), symbol("b", 0x2000_0008, 4)]);
        assert_eq!(*changes.borrow_and_update(), 1);

        model.replace_heap_blocks(&[HeapBlock { pointer: 0x2000_0100, size: 8 }]);
        assert_eq!(*changes.borrow_and_update(), 2);
    }

    #[test]
    fn test_region_tree_buckets_by_address() {
        let mut model = MemoryModel::new();
        model.load_symbols(&[
            symbol("in_flash", 0x0800_0100, 16),
            symbol("in_sram", 0x2000_0010, 4),
            symbol("nowhere", 0x6000_0000, 4),
        ]);
        let config = RegionConfig {
            flash: MemoryRegion::new("Flash", 0x0800_0000, 0x0800_ffff).unwrap(),
            sram: sram(),
        };
        let tree = model.region_tree(&config);
        assert_eq!(tree.len(), 2);
        let ItemKind::Region { children } = &tree[0].kind else {
            panic!("expected region item");
        };
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "in_flash");
        let ItemKind::Region { children } = &tree[1].kind else {
            panic!("expected region item");
        };
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "in_sram");
    }

    #[test]
    fn test_peripherals_bucket_and_segment() {
        let mut model = MemoryModel::new();
        model.add_peripherals(&[
            ("USART1".to_string(), 0x4001_3800, 0x400),
            ("GPIOA".to_string(), 0x4001_0800, 0x400),
        ]);
        assert_eq!(model.count_of("peripheral"), 2);

        let apb2 = MemoryRegion::new("APB2", 0x4001_0000, 0x4001_ffff).unwrap();
        let segment = model
            .segment_for(&apb2, EmptyRegionPolicy::Omit)
            .unwrap()
            .unwrap();
        let names: Vec<_> = segment.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Unused", "GPIOA", "Unused", "USART1", "Unused"]);
    }

    #[test]
    fn test_item_ids_deterministic() {
        let variable = MemoryItem::variable(&symbol("counter", 0x2000_0010, 4));
        assert_eq!(variable.id, "var_counter");
        let heap = MemoryItem::heap_block(&HeapBlock { pointer: 0x2000_0140, size: 24 });
        assert_eq!(heap.id, "heap_20000140");
        assert_eq!(heap.name, "Heap Block @0x20000140");
        let gap = MemoryItem::gap(0x2000_0000, 0x10);
        assert_eq!(gap.id, "gap_20000000");
    }

    #[test]
    fn test_segment_for_uses_catalog() {
        let mut model = MemoryModel::new();
        model.load_symbols(&[symbol("counter", 0x2000_0010, 0x10)]);
        let segment = model
            .segment_for(&sram(), EmptyRegionPolicy::FullGap)
            .unwrap()
            .unwrap();
        assert_eq!(segment.entries.len(), 3);
        assert_eq!(segment.entries[1].name, "counter");
    }
}
