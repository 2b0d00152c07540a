//! Memory View: read-only windowed formatting of the live memory image.
//!
//! Pure functions of the byte sequence; recomputed on every CPU-state
//! change and never mutating anything. Byte-level hex/ASCII columns are
//! endian-agnostic; multi-byte values read as little-endian.

/// Numeric base for the address and data columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBase {
    Hex,
    Decimal,
}

/// Format `memory` as address / byte / ASCII columns, `bytes_per_line`
/// bytes per line starting at offset `start`.
///
/// Byte columns get an extra space after every 4 bytes; the ASCII column
/// is separated by ` | ` and prints `.` for non-printable bytes. The
/// final partial line is padded with blank placeholders so the hex and
/// ASCII columns stay aligned across lines.
pub fn format_memory(
    memory: &[u8],
    start: u64,
    bytes_per_line: usize,
    base: DisplayBase,
) -> Vec<String> {
    let bytes_per_line = bytes_per_line.max(1);
    let window = &memory[(start as usize).min(memory.len())..];

    let mut lines = Vec::with_capacity(window.len().div_ceil(bytes_per_line));
    for (row, chunk) in window.chunks(bytes_per_line).enumerate() {
        let address = start + (row * bytes_per_line) as u64;
        let mut line = match base {
            DisplayBase::Hex => format!("{address:08x}  "),
            DisplayBase::Decimal => format!("{address:10}  "),
        };

        for slot in 0..bytes_per_line {
            match chunk.get(slot) {
                Some(byte) => match base {
                    DisplayBase::Hex => line.push_str(&byte_to_hex(*byte)),
                    DisplayBase::Decimal => line.push_str(&format!("{byte:3}")),
                },
                // Blank placeholder, same width as a real byte.
                None => line.push_str(match base {
                    DisplayBase::Hex => "  ",
                    DisplayBase::Decimal => "   ",
                }),
            }
            line.push(' ');
            if (slot + 1) % 4 == 0 {
                line.push(' ');
            }
        }

        line.push_str("| ");
        for byte in chunk {
            line.push(printable_char(*byte));
        }
        lines.push(line);
    }
    lines
}

/// Two-digit lowercase hex for one byte.
pub fn byte_to_hex(byte: u8) -> String {
    format!("{byte:02x}")
}

/// Read a 32-bit little-endian word at `offset`, or `None` if the word
/// would run off the end of `memory`.
pub fn read_word_le(memory: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let bytes = memory.get(offset..end)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Printable ASCII passes through; everything else renders as `.`.
fn printable_char(byte: u8) -> char {
    if byte > 32 && byte < 126 {
        byte as char
    } else {
        '.'
    }
}
