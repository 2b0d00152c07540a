use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use elfsim_core::disasm::{
    DisasmOutcome, DisasmPipeline, DisasmRequest, ObjdumpTool, ToolchainConfig,
};

use crate::canonicalize_or_current;

/// Resolve the binary argument to an absolute path plus the working
/// directory the disassembler runs in (the binary's folder).
pub fn resolve_binary(binary: &str) -> Result<(PathBuf, PathBuf)> {
    let binary_path = canonicalize_or_current(binary)?;
    let working_dir = binary_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((binary_path, working_dir))
}

/// Disassemble one binary with the external objdump, blocking on the
/// pipeline worker. Returns the resolved binary path along with the
/// outcome so callers key caches and the simulator off the same path.
pub fn disassemble_binary(
    binary: &str,
    config: ToolchainConfig,
) -> Result<(PathBuf, DisasmOutcome)> {
    let (binary_path, working_dir) = resolve_binary(binary)?;
    let pipeline = DisasmPipeline::new();
    let request = DisasmRequest { binary_path: binary_path.clone(), working_dir, config };
    let outcome = pipeline
        .disassemble_blocking(request, Arc::new(ObjdumpTool))
        .with_context(|| format!("Failed to disassemble {}", binary_path.display()))?;

    if let Some(code) = outcome.exit_code {
        if code != 0 {
            eprintln!("objdump exited with code: {code}");
        }
    }
    Ok((binary_path, outcome))
}
