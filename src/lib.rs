//! Firmware Memory Layout Inspector
//!
//! Reconstructs a navigable map of a microcontroller's address space during
//! a live debug session: global/static variables extracted from the firmware
//! ELF image, live heap allocations read over the debug transport, and the
//! unused space between them, partitioned into contiguous renderable
//! segments per configured region (flash, SRAM).

pub mod config;
pub mod elf;
pub mod error;
pub mod memory;
pub mod session;
pub mod utils;

pub use config::{Config, MemoryRegion, RegionConfig};
pub use error::{ElfError, InspectError, Result};
pub use session::InspectSession;
