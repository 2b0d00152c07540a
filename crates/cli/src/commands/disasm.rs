use std::path::Path;

use anyhow::{Context, Result};

use elfsim_core::cache::DisasmCache;
use elfsim_core::model::BinaryImage;

use crate::commands::{disassemble_binary, resolve_binary};
use crate::{resolve_toolchain, sha256_file};

/// Arguments for the `disasm` subcommand, bundled so the dispatch in
/// `main` stays a one-liner.
pub struct DisasmArgs<'a> {
    pub binary: &'a str,
    pub config_file: Option<&'a str>,
    pub toolchain_dir: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub flags: Option<&'a str>,
    pub cache_db: Option<&'a str>,
    pub reload: bool,
    pub json: bool,
}

/// Disassemble a binary and print its sections, symbols, and
/// instructions (or the whole image as JSON).
///
/// With `--cache-db`, a cached image is reused as long as the binary's
/// SHA-256 hash still matches; `--reload` forces a fresh toolchain run.
pub fn disasm_command(args: DisasmArgs<'_>) -> Result<()> {
    let config = resolve_toolchain(args.config_file, args.toolchain_dir, args.prefix, args.flags)?;
    let (binary_path, _) = resolve_binary(args.binary)?;

    let cache = match args.cache_db {
        Some(db) => Some(
            DisasmCache::open(Path::new(db))
                .with_context(|| format!("Failed to open disassembly cache at {db}"))?,
        ),
        None => None,
    };

    let hash = sha256_file(&binary_path).ok();

    if !args.reload {
        if let (Some(cache), Some(hash)) = (&cache, &hash) {
            if let Some(cached) = cache
                .load(&binary_path)
                .with_context(|| format!("Failed to read cache for {}", binary_path.display()))?
            {
                if cached.hash.as_deref() == Some(hash.as_str()) {
                    print_image(&cached.image, args.json)?;
                    if !args.json {
                        println!("(cached at {})", cached.cached_at);
                    }
                    return Ok(());
                }
            }
        }
    }

    let (binary_path, outcome) = disassemble_binary(args.binary, config)?;

    if let Some(cache) = &cache {
        cache
            .store(&binary_path, hash.as_deref(), &outcome.image)
            .with_context(|| format!("Failed to cache image for {}", binary_path.display()))?;
    }

    print_image(&outcome.image, args.json)
}

fn print_image(image: &BinaryImage, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(image).context("Failed to serialize image to JSON")?
        );
        return Ok(());
    }

    println!("Instructions: {}", image.instruction_count());
    for section in &image.sections {
        println!("Section {}:", section.name);
        for symbol in &section.symbols {
            let name = symbol.name.as_deref().unwrap_or("(anonymous)");
            println!("  {:08x} <{}>:", symbol.address, name);
            for line in &symbol.lines {
                if let Some(source) = &line.source {
                    println!("    ; {}:{}", source.file, source.line);
                }
                for instr in &line.instructions {
                    println!("    {:8x}: {:<20} {}", instr.address, instr.encoding, instr.mnemonic);
                }
            }
        }
    }
    Ok(())
}
