use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use elfsim_core::disasm::ToolchainConfig;

pub mod commands;

/// Canonicalize the given path if possible, falling back to joining it
/// onto the current working directory.
pub fn canonicalize_or_current(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Try to canonicalize; if it fails (e.g., path does not yet exist),
        // join it with the current dir to get an absolute path.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open binary for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read binary for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}

/// Parse an address argument: `0x`-prefixed hex or plain decimal.
pub fn parse_address(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u64>()
    };
    parsed.map_err(|_| anyhow!("Invalid address '{}' (expected 0x-hex or decimal)", text))
}

/// On-disk toolchain settings (YAML). Every field is optional so a file
/// can pin just the prefix, or just the flags.
#[derive(Debug, Default, Deserialize)]
pub struct ToolchainFile {
    #[serde(default)]
    pub toolchain_dir: Option<PathBuf>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub objdump_flags: Option<String>,
}

/// Default objdump flag string: disassemble with interleaved source.
pub const DEFAULT_OBJDUMP_FLAGS: &str = "-d -S";

/// Build the effective [`ToolchainConfig`]: start from defaults, layer the
/// YAML file (if given), then let explicit CLI flags win.
pub fn resolve_toolchain(
    config_file: Option<&str>,
    toolchain_dir: Option<&str>,
    prefix: Option<&str>,
    flags: Option<&str>,
) -> Result<ToolchainConfig> {
    let from_file: ToolchainFile = match config_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read toolchain config at {path}"))?;
            serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse toolchain config at {path}"))?
        }
        None => ToolchainFile::default(),
    };

    Ok(ToolchainConfig {
        toolchain_dir: toolchain_dir
            .map(PathBuf::from)
            .or(from_file.toolchain_dir)
            .unwrap_or_default(),
        prefix: prefix.map(str::to_string).or(from_file.prefix).unwrap_or_default(),
        objdump_flags: flags
            .map(str::to_string)
            .or(from_file.objdump_flags)
            .unwrap_or_else(|| DEFAULT_OBJDUMP_FLAGS.to_string()),
    })
}
