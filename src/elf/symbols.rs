//! Variable symbol extraction from ELF32 symbol tables

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::elf::reader::ElfReader;
use crate::error::{ElfError, Result};

/// ELF identification
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;

/// Fixed ELF32 header field offsets
const E_SHOFF: usize = 32;
const E_SHENTSIZE: usize = 46;
const E_SHNUM: usize = 48;
const E_SHSTRNDX: usize = 50;

/// Section header field offsets (relative to the header start)
const SH_TYPE: usize = 4;
const SH_OFFSET: usize = 16;
const SH_SIZE: usize = 20;
const SH_LINK: usize = 24;

/// Section types
const SHT_SYMTAB: u32 = 2;

/// ELF32 symbol table entry layout: name(4) value(4) size(4) info(1)
/// other(1) shndx(2)
const SYM_ENTRY_SIZE: usize = 16;
const ST_VALUE: usize = 4;
const ST_SIZE: usize = 8;
const ST_INFO: usize = 12;
const ST_SHNDX: usize = 14;

/// Symbol type and binding codes
const STT_OBJECT: u8 = 1;
const STB_LOCAL: u8 = 0;
const STB_GLOBAL: u8 = 1;

/// Linkage binding of a data symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolBinding {
    Local,
    Global,
}

impl std::fmt::Display for SymbolBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolBinding::Local => write!(f, "local"),
            SymbolBinding::Global => write!(f, "global"),
        }
    }
}

/// A global or static data object recovered from the symbol table.
///
/// `address` is the symbol's virtual address on the target, not a file
/// offset. `size` is always nonzero; zero-size entries are dropped during
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    pub size: u32,
    pub binding: SymbolBinding,
    pub section_index: u16,
}

/// Extract global/static variable symbols from an ELF32 little-endian image.
///
/// Walks the section header table to the first `SHT_SYMTAB` section and its
/// linked string table, then decodes every 16-byte symbol entry, keeping only
/// `STT_OBJECT` symbols with nonzero size and local or global binding.
/// Functions, section markers and zero-size symbols are not variables and are
/// filtered out. An image without a symbol table yields an empty list, not an
/// error.
///
/// Only 32-bit little-endian images are accepted; other class/endianness
/// combinations fail with [`ElfError::UnsupportedClass`] /
/// [`ElfError::UnsupportedEndianness`] rather than being mis-parsed with
/// 32-bit field widths.
pub fn extract_symbols(data: &[u8]) -> Result<Vec<Symbol>> {
    if data.len() < 6 || data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic.into());
    }
    if data[4] != ELFCLASS32 {
        return Err(ElfError::UnsupportedClass(data[4]).into());
    }
    if data[5] != ELFDATA2LSB {
        return Err(ElfError::UnsupportedEndianness(data[5]).into());
    }

    let reader = ElfReader::new(data);

    let shoff = reader.read_u32_le(E_SHOFF)? as usize;
    let shentsize = reader.read_u16_le(E_SHENTSIZE)? as usize;
    let shnum = reader.read_u16_le(E_SHNUM)? as usize;
    let shstrndx = reader.read_u16_le(E_SHSTRNDX)?;
    debug!(
        "section header table: offset=0x{:x} entsize={} count={} shstrndx={}",
        shoff, shentsize, shnum, shstrndx
    );

    // Locate the first symbol table section and its linked string table.
    let mut symtab: Option<(usize, usize)> = None;
    let mut strtab: Option<(usize, usize)> = None;
    for i in 0..shnum {
        let shdr = shoff + i * shentsize;
        if reader.read_u32_le(shdr + SH_TYPE)? != SHT_SYMTAB {
            continue;
        }
        let offset = reader.read_u32_le(shdr + SH_OFFSET)? as usize;
        let size = reader.read_u32_le(shdr + SH_SIZE)? as usize;
        let link = reader.read_u32_le(shdr + SH_LINK)? as usize;
        symtab = Some((offset, size));

        let strhdr = shoff + link * shentsize;
        let str_offset = reader.read_u32_le(strhdr + SH_OFFSET)? as usize;
        let str_size = reader.read_u32_le(strhdr + SH_SIZE)? as usize;
        strtab = Some((str_offset, str_size));
        debug!(
            "found symbol table: offset=0x{:x} size={} strtab offset=0x{:x} size={}",
            offset, size, str_offset, str_size
        );
        break;
    }

    let (Some((symtab_offset, symtab_size)), Some((strtab_offset, strtab_size))) =
        (symtab, strtab)
    else {
        // No symbol table is a valid (stripped) image, not a parse failure.
        info!("no symbol table section found");
        return Ok(Vec::new());
    };

    // Fail up front if the section header claims more bytes than the image
    // holds; a partial symbol list must never be returned.
    if symtab_offset.checked_add(symtab_size).map_or(true, |end| end > reader.len()) {
        return Err(ElfError::Truncated {
            offset: symtab_offset,
            needed: symtab_size,
        }
        .into());
    }

    let mut symbols = Vec::new();
    for i in 0..symtab_size / SYM_ENTRY_SIZE {
        let entry = symtab_offset + i * SYM_ENTRY_SIZE;
        let name_offset = reader.read_u32_le(entry)? as usize;
        let value = reader.read_u32_le(entry + ST_VALUE)?;
        let size = reader.read_u32_le(entry + ST_SIZE)?;
        let info = reader.read_u8(entry + ST_INFO)?;
        let shndx = reader.read_u16_le(entry + ST_SHNDX)?;
        let bind = info >> 4;
        let sym_type = info & 0xf;

        // Name offset 0 is the reserved empty name; past the string table is
        // a malformed entry. Neither is worth aborting the whole parse over.
        if name_offset == 0 || name_offset >= strtab_size {
            continue;
        }

        let binding = match bind {
            STB_LOCAL => SymbolBinding::Local,
            STB_GLOBAL => SymbolBinding::Global,
            _ => continue,
        };
        if sym_type != STT_OBJECT || size == 0 {
            continue;
        }

        let name_bytes =
            reader.read_cstr(strtab_offset + name_offset, strtab_size - name_offset)?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        debug!("variable symbol: {} at 0x{:08x}, {} bytes, {}", name, value, size, binding);

        symbols.push(Symbol {
            name,
            address: value,
            size,
            binding,
            section_index: shndx,
        });
    }

    info!("extracted {} variable symbols", symbols.len());
    Ok(symbols)
}

/// Read an ELF file from disk and extract its variable symbols.
pub fn extract_symbols_from_file(path: &Path) -> Result<Vec<Symbol>> {
    debug!("reading ELF image: {}", path.display());
    let data = std::fs::read(path)?;
    extract_symbols(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw symbol entry used by the test image builder.
    struct TestSym {
        name: &'static str,
        value: u32,
        size: u32,
        info: u8,
        shndx: u16,
    }

    /// Build a minimal ELF32-LE image: header, three section headers
    /// (null, symtab, strtab), the symbol table and its string table.
    fn build_elf(syms: &[TestSym]) -> Vec<u8> {
        const EHDR_SIZE: usize = 52;
        const SHDR_SIZE: usize = 40;
        let shoff = EHDR_SIZE;
        let symtab_offset = shoff + 3 * SHDR_SIZE;

        // String table: leading NUL, then each name NUL-terminated.
        let mut strtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for sym in syms {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
        }

        // Null symbol entry plus one entry per test symbol.
        let mut symtab = vec![0u8; SYM_ENTRY_SIZE];
        for (sym, &name_offset) in syms.iter().zip(&name_offsets) {
            let mut entry = [0u8; SYM_ENTRY_SIZE];
            entry[0..4].copy_from_slice(&name_offset.to_le_bytes());
            entry[4..8].copy_from_slice(&sym.value.to_le_bytes());
            entry[8..12].copy_from_slice(&sym.size.to_le_bytes());
            entry[12] = sym.info;
            entry[14..16].copy_from_slice(&sym.shndx.to_le_bytes());
            symtab.extend_from_slice(&entry);
        }
        let strtab_offset = symtab_offset + symtab.len();

        let mut image = Vec::new();
        image.extend_from_slice(&ELF_MAGIC);
        image.push(ELFCLASS32);
        image.push(ELFDATA2LSB);
        image.push(1); // EI_VERSION
        image.resize(16, 0); // rest of e_ident
        image.extend_from_slice(&1u16.to_le_bytes()); // e_type (ET_REL)
        image.extend_from_slice(&40u16.to_le_bytes()); // e_machine (EM_ARM)
        image.extend_from_slice(&1u32.to_le_bytes()); // e_version
        image.extend_from_slice(&0u32.to_le_bytes()); // e_entry
        image.extend_from_slice(&0u32.to_le_bytes()); // e_phoff
        image.extend_from_slice(&(shoff as u32).to_le_bytes()); // e_shoff
        image.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        image.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes()); // e_ehsize
        image.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
        image.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        image.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes()); // e_shentsize
        image.extend_from_slice(&3u16.to_le_bytes()); // e_shnum
        image.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

        let shdr = |sh_type: u32, offset: u32, size: u32, link: u32| {
            let mut header = [0u8; SHDR_SIZE];
            header[4..8].copy_from_slice(&sh_type.to_le_bytes());
            header[16..20].copy_from_slice(&offset.to_le_bytes());
            header[20..24].copy_from_slice(&size.to_le_bytes());
            header[24..28].copy_from_slice(&link.to_le_bytes());
            header
        };
        image.extend_from_slice(&shdr(0, 0, 0, 0));
        image.extend_from_slice(&shdr(
            SHT_SYMTAB,
            symtab_offset as u32,
            symtab.len() as u32,
            2,
        ));
        image.extend_from_slice(&shdr(3, strtab_offset as u32, strtab.len() as u32, 0));
        assert_eq!(image.len(), symtab_offset);
        image.extend_from_slice(&symtab);
        image.extend_from_slice(&strtab);
        image
    }

    fn object(bind: u8) -> u8 {
        (bind << 4) | STT_OBJECT
    }

    #[test]
    fn test_single_global_variable() {
        let image = build_elf(&[TestSym {
            name: "counter",
            value: 0x2000_0010,
            size: 4,
            info: object(STB_GLOBAL),
            shndx: 3,
        }]);
        let symbols = extract_symbols(&image).unwrap();
        assert_eq!(
            symbols,
            vec![Symbol {
                name: "counter".to_string(),
                address: 0x2000_0010,
                size: 4,
                binding: SymbolBinding::Global,
                section_index: 3,
            }]
        );
    }

    #[test]
    fn test_filters_non_variable_symbols() {
        const STT_FUNC: u8 = 2;
        const STB_WEAK: u8 = 2;
        let image = build_elf(&[
            TestSym {
                name: "main",
                value: 0x0800_0100,
                size: 64,
                info: (STB_GLOBAL << 4) | STT_FUNC,
                shndx: 1,
            },
            TestSym {
                name: "zero_size_marker",
                value: 0x2000_0000,
                size: 0,
                info: object(STB_GLOBAL),
                shndx: 3,
            },
            TestSym {
                name: "weak_obj",
                value: 0x2000_0020,
                size: 8,
                info: object(STB_WEAK),
                shndx: 3,
            },
            TestSym {
                name: "uart_buffer",
                value: 0x2000_0040,
                size: 128,
                info: object(STB_LOCAL),
                shndx: 3,
            },
        ]);
        let symbols = extract_symbols(&image).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "uart_buffer");
        assert_eq!(symbols[0].binding, SymbolBinding::Local);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let image = build_elf(&[
            TestSym {
                name: "late",
                value: 0x2000_0100,
                size: 4,
                info: object(STB_GLOBAL),
                shndx: 3,
            },
            TestSym {
                name: "early",
                value: 0x2000_0000,
                size: 4,
                info: object(STB_GLOBAL),
                shndx: 3,
            },
        ]);
        let symbols = extract_symbols(&image).unwrap();
        let names: Vec<_> = symbols.iter().map(|s| s.name.as_str()).collect();
        // Symbol table order, no re-sort by address.
        assert_eq!(names, vec!["late", "early"]);
    }

    #[test]
    fn test_bad_magic() {
        let result = extract_symbols(b"\x00ELFnope");
        assert!(matches!(
            result,
            Err(crate::error::InspectError::Elf(ElfError::InvalidMagic))
        ));
        assert!(extract_symbols(b"\x7fE").is_err());
    }

    #[test]
    fn test_unsupported_class_and_endianness() {
        let mut image = build_elf(&[]);
        image[4] = 2; // ELFCLASS64
        assert!(matches!(
            extract_symbols(&image),
            Err(crate::error::InspectError::Elf(ElfError::UnsupportedClass(2)))
        ));

        let mut image = build_elf(&[]);
        image[5] = 2; // ELFDATA2MSB
        assert!(matches!(
            extract_symbols(&image),
            Err(crate::error::InspectError::Elf(
                ElfError::UnsupportedEndianness(2)
            ))
        ));
    }

    #[test]
    fn test_no_symtab_is_empty_not_error() {
        let mut image = build_elf(&[]);
        // Overwrite the symtab section type so no SHT_SYMTAB exists.
        let shdr_offset = 52 + 40 + 4;
        image[shdr_offset..shdr_offset + 4].copy_from_slice(&1u32.to_le_bytes());
        assert_eq!(extract_symbols(&image).unwrap(), vec![]);
    }

    #[test]
    fn test_truncated_symtab_fails() {
        let image = build_elf(&[TestSym {
            name: "counter",
            value: 0x2000_0010,
            size: 4,
            info: object(STB_GLOBAL),
            shndx: 3,
        }]);
        // Inflate the claimed symtab size past the end of the image.
        let size_field = 52 + 40 + 20;
        let mut broken = image.clone();
        broken[size_field..size_field + 4].copy_from_slice(&0x10000u32.to_le_bytes());
        assert!(matches!(
            extract_symbols(&broken),
            Err(crate::error::InspectError::Elf(ElfError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_invalid_name_offset_skipped() {
        let image = build_elf(&[
            TestSym {
                name: "kept",
                value: 0x2000_0000,
                size: 4,
                info: object(STB_GLOBAL),
                shndx: 3,
            },
            TestSym {
                name: "clobbered",
                value: 0x2000_0010,
                size: 4,
                info: object(STB_GLOBAL),
                shndx: 3,
            },
        ]);
        // Point the second entry's name past the string table.
        let entry = 52 + 3 * 40 + 2 * SYM_ENTRY_SIZE;
        let mut broken = image.clone();
        broken[entry..entry + 4].copy_from_slice(&0xffffu32.to_le_bytes());
        let symbols = extract_symbols(&broken).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "kept");
    }

    #[test]
    fn test_from_file_missing_and_invalid() {
        assert!(extract_symbols_from_file(Path::new("/nonexistent/firmware.elf")).is_err());

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not an elf file").unwrap();
        assert!(extract_symbols_from_file(tmp.path()).is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let image = build_elf(&[TestSym {
            name: "counter",
            value: 0x2000_0010,
            size: 4,
            info: object(STB_GLOBAL),
            shndx: 3,
        }]);
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), &image).unwrap();
        let symbols = extract_symbols_from_file(tmp.path()).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].address, 0x2000_0010);
    }
}
