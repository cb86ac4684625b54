//! Configuration for the memory layout inspector

use std::path::PathBuf;

use clap::Parser;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InspectError, Result};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "memlayout")]
#[command(about = "Inspect the memory layout of a firmware ELF image")]
#[command(version)]
pub struct Args {
    /// Path to the firmware ELF image
    pub elf: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Derive flash/RAM boundaries from a linker script MEMORY block
    #[arg(long)]
    pub linker_script: Option<PathBuf>,

    /// Flash origin address (e.g. 0x08000000)
    #[arg(long, value_parser = parse_address)]
    pub flash_origin: Option<u32>,

    /// Flash size in KB
    #[arg(long)]
    pub flash_size_kb: Option<u32>,

    /// SRAM origin address (e.g. 0x20000000)
    #[arg(long, value_parser = parse_address)]
    pub sram_origin: Option<u32>,

    /// SRAM size in KB
    #[arg(long)]
    pub sram_size_kb: Option<u32>,

    /// Emit machine-readable JSON instead of a text table
    #[arg(long)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Generate default configuration file
    #[arg(long)]
    pub generate_config: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

/// Parse a CLI address argument, accepting `0x`-prefixed hex or decimal.
fn parse_address(s: &str) -> std::result::Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub regions: RegionSettings,
    pub heap: HeapSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                InspectError::InvalidConfig(format!("Failed to read config file: {}", e))
            })?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| InspectError::InvalidConfig(format!("Invalid TOML syntax: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Merge command line arguments into configuration
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(origin) = args.flash_origin {
            self.regions.flash.origin = origin;
        }
        if let Some(size_kb) = args.flash_size_kb {
            self.regions.flash.size_kb = size_kb;
        }
        if let Some(origin) = args.sram_origin {
            self.regions.sram.origin = origin;
        }
        if let Some(size_kb) = args.sram_size_kb {
            self.regions.sram.size_kb = size_kb;
        }
        self.logging.level = args.log_level.clone();
        self.logging.file = args.log_file.clone();
    }

    /// Validate configuration. Malformed boundaries fail here, at load time,
    /// never at render time.
    pub fn validate(&self) -> Result<()> {
        self.regions.to_region_config()?;
        if self.heap.table_symbol.is_empty() {
            return Err(InspectError::InvalidConfig(
                "heap.table_symbol must not be empty".to_string(),
            ));
        }
        if self.heap.poll_interval_ms == 0 {
            return Err(InspectError::InvalidConfig(
                "heap.poll_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate TOML configuration string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| InspectError::InvalidConfig(format!("Failed to serialize config: {}", e)))
    }
}

/// Configured flash and SRAM extents, as `{origin, size in KB}` pairs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegionSettings {
    pub flash: RegionSpec,
    pub sram: RegionSpec,
}

impl Default for RegionSettings {
    fn default() -> Self {
        // STM32F1-class defaults: 64 KB flash, 32 KB SRAM.
        Self {
            flash: RegionSpec { origin: 0x0800_0000, size_kb: 64 },
            sram: RegionSpec { origin: 0x2000_0000, size_kb: 32 },
        }
    }
}

impl RegionSettings {
    pub fn to_region_config(&self) -> Result<RegionConfig> {
        Ok(RegionConfig {
            flash: self.flash.to_region("Flash")?,
            sram: self.sram.to_region("SRAM")?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RegionSpec {
    pub origin: u32,
    pub size_kb: u32,
}

impl RegionSpec {
    pub fn to_region(&self, name: &str) -> Result<MemoryRegion> {
        let size = self.size_kb as u64 * 1024;
        if size == 0 {
            return Err(InspectError::InvalidRegion {
                name: name.to_string(),
                start: self.origin,
                end: self.origin,
            });
        }
        let end = self.origin as u64 + size - 1;
        let end = u32::try_from(end).map_err(|_| InspectError::InvalidRegion {
            name: name.to_string(),
            start: self.origin,
            end: u32::MAX,
        })?;
        MemoryRegion::new(name, self.origin, end)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HeapSettings {
    /// Name of the target-resident allocation table symbol.
    pub table_symbol: String,
    /// Interval between periodic heap refreshes.
    pub poll_interval_ms: u64,
}

impl Default for HeapSettings {
    fn default() -> Self {
        Self {
            table_symbol: "heap_info".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// A contiguous address range on the target. `end` is inclusive.
///
/// Immutable once built from configuration; validated at construction so
/// downstream segmentation never sees a malformed range.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

impl MemoryRegion {
    pub fn new(name: &str, start: u32, end: u32) -> Result<Self> {
        if end < start {
            return Err(InspectError::InvalidRegion {
                name: name.to_string(),
                start,
                end,
            });
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
        })
    }

    pub fn contains(&self, address: u32) -> bool {
        (self.start..=self.end).contains(&address)
    }

    /// Region size in bytes. `u64` because a full 4 GiB range does not fit
    /// in `u32`.
    pub fn size(&self) -> u64 {
        self.end as u64 - self.start as u64 + 1
    }
}

/// Validated flash and SRAM regions for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub flash: MemoryRegion,
    pub sram: MemoryRegion,
}

impl RegionConfig {
    pub fn regions(&self) -> [&MemoryRegion; 2] {
        [&self.flash, &self.sram]
    }
}

/// Extract flash and RAM extents from a linker script `MEMORY` block:
///
/// ```text
/// MEMORY
/// {
///   FLASH (rx) : ORIGIN = 0x08000000, LENGTH = 64K
///   SRAM (rwx) : ORIGIN = 0x20000000, LENGTH = 20K
/// }
/// ```
///
/// Returns `None` when the script does not declare both regions.
pub fn parse_linker_script(text: &str) -> Option<RegionSettings> {
    let flash_re =
        Regex::new(r"(?s)FLASH.*?ORIGIN\s*=\s*(0x[0-9A-Fa-f]+).*?LENGTH\s*=\s*(\d+)K").unwrap();
    let ram_re =
        Regex::new(r"(?s)RAM.*?ORIGIN\s*=\s*(0x[0-9A-Fa-f]+).*?LENGTH\s*=\s*(\d+)K").unwrap();

    let spec = |captures: regex::Captures<'_>| -> Option<RegionSpec> {
        let origin = u32::from_str_radix(&captures[1][2..], 16).ok()?;
        let size_kb = captures[2].parse().ok()?;
        Some(RegionSpec { origin, size_kb })
    };

    let flash = flash_re.captures(text).and_then(spec)?;
    let sram = ram_re.captures(text).and_then(spec)?;
    debug!(
        "linker script regions: flash 0x{:08x}/{}K, sram 0x{:08x}/{}K",
        flash.origin, flash.size_kb, sram.origin, sram.size_kb
    );
    Some(RegionSettings { flash, sram })
}
