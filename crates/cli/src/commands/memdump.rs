use std::fs;

use anyhow::{Context, Result};

use elfsim_core::memview::{format_memory, DisplayBase};

/// Format a raw file's bytes as address / byte / ASCII columns.
pub fn memdump_command(file: &str, bytes_per_line: usize, decimal: bool, start: u64) -> Result<()> {
    let bytes =
        fs::read(file).with_context(|| format!("Failed to read memory image at {file}"))?;

    let base = if decimal { DisplayBase::Decimal } else { DisplayBase::Hex };
    for line in format_memory(&bytes, start, bytes_per_line, base) {
        println!("{line}");
    }
    Ok(())
}
