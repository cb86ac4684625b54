//! Live memory model: transport abstraction, heap decoding, the item
//! catalog and address-range segmentation.

pub mod heap;
pub mod model;
pub mod reader;
pub mod segment;

pub use heap::{decode_heap_blocks, HeapBlock};
pub use model::{ItemKind, MemoryItem, MemoryModel};
pub use reader::MemoryReader;
pub use segment::{segment_region, EmptyRegionPolicy, Segment};
