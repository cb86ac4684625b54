//! Address-range segmentation
//!
//! Turns a flat set of address-tagged items plus a declared region into an
//! ordered partition ready for rendering: real items interleaved with
//! synthesized gaps so the whole region is covered with no overlaps.

use serde::Serialize;
use tracing::trace;

use crate::config::MemoryRegion;
use crate::error::Result;
use crate::memory::model::MemoryItem;

/// What to produce for a region whose item set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyRegionPolicy {
    /// No segment at all: the region has no content worth rendering.
    Omit,
    /// A segment holding a single gap spanning the whole region.
    FullGap,
}

/// A fully-tiled partition of one region, ordered by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub name: String,
    pub entries: Vec<MemoryItem>,
    pub min_address: u32,
    pub max_address: u32,
}

/// Partition `region` into its contained items plus synthesized gaps.
///
/// Items whose address falls outside `[region.start, region.end]` are
/// ignored. For any non-overlapping input set the returned entries' spans
/// exactly tile `[region.start, region.end]` (inclusive end), in ascending
/// address order. Inputs are not mutated; calling twice yields identical
/// output.
pub fn segment_region(
    region: &MemoryRegion,
    items: &[MemoryItem],
    policy: EmptyRegionPolicy,
) -> Result<Option<Segment>> {
    // Region validity is enforced at construction; re-checked here so a
    // hand-built region cannot produce a nonsensical partition.
    let region = MemoryRegion::new(&region.name, region.start, region.end)?;

    let mut retained: Vec<MemoryItem> = items
        .iter()
        .filter(|item| region.contains(item.address))
        .cloned()
        .collect();
    retained.sort_by_key(|item| item.address);

    if retained.is_empty() {
        return match policy {
            EmptyRegionPolicy::Omit => Ok(None),
            EmptyRegionPolicy::FullGap => Ok(Some(Segment {
                name: region.name.clone(),
                entries: vec![gap_spanning(region.start as u64, region.end as u64 + 1)],
                min_address: region.start,
                max_address: region.end,
            })),
        };
    }

    let mut entries = Vec::with_capacity(retained.len() * 2);
    let mut cursor = region.start as u64;
    for item in retained {
        let address = item.address as u64;
        if address > cursor {
            entries.push(gap_spanning(cursor, address));
        }
        cursor = cursor.max(item.end());
        trace!("segment entry {} [0x{:08x}, 0x{:x})", item.name, item.address, item.end());
        entries.push(item);
    }
    let region_end = region.end as u64 + 1;
    if cursor < region_end {
        entries.push(gap_spanning(cursor, region_end));
    }

    Ok(Some(Segment {
        name: region.name.clone(),
        entries,
        min_address: region.start,
        max_address: region.end,
    }))
}

/// Gap covering `[start, end)`. Sizes are clamped to `u32::MAX`; only a
/// 4 GiB region with no items could exceed that.
fn gap_spanning(start: u64, end: u64) -> MemoryItem {
    let size = u32::try_from(end - start).unwrap_or(u32::MAX);
    MemoryItem::gap(start as u32, size)
}
