//! Formatting helpers for addresses, sizes and raw memory dumps

/// `0x`-prefixed, zero-padded 32-bit address.
pub fn format_address(address: u32) -> String {
    format!("0x{:08X}", address)
}

/// Human-readable byte count (Bytes / KB / MB).
pub fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
    } else if size >= 1024 {
        format!("{:.2} KB", size as f64 / 1024.0)
    } else {
        format!("{} Bytes", size)
    }
}

/// Classic hex+ASCII dump, 16 bytes per row, addressed from `base_address`.
pub fn hex_dump(base_address: u32, data: &[u8]) -> String {
    const BYTES_PER_LINE: usize = 16;

    let mut output = String::new();
    output.push_str("         ");
    for i in 0..BYTES_PER_LINE {
        output.push_str(&format!(" {:02X}", i));
    }
    output.push_str("  |0123456789ABCDEF|\n");
    output.push_str(&"-".repeat(77));
    output.push('\n');

    for (row, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        let address = base_address.wrapping_add((row * BYTES_PER_LINE) as u32);
        output.push_str(&format!("{}: ", format_address(address)));

        let mut hex_part = String::new();
        for byte in line {
            hex_part.push_str(&format!("{:02X} ", byte));
        }
        output.push_str(&format!("{:<width$}", hex_part, width = BYTES_PER_LINE * 3));

        output.push_str("  |");
        for &byte in line {
            output.push(if (32..=126).contains(&byte) { byte as char } else { '.' });
        }
        for _ in line.len()..BYTES_PER_LINE {
            output.push(' ');
        }
        output.push_str("|\n");
    }

    output
}
