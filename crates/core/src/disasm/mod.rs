//! Disassembly layer: toolchain configuration, external disassembler
//! invocation, dump parsing, and the background single-flight pipeline.

mod parse;
mod pipeline;

pub use parse::parse_dump;
pub use pipeline::{DisasmOutcome, DisasmPipeline};

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Binary extensions the pipeline accepts for disassembly.
pub const BINARY_EXTENSIONS: &[&str] = &["elf", "o", "out", "axf"];

/// Env var tests set to a file of canned objdump output so they do not
/// need a cross-toolchain installed.
pub const FAKE_OBJDUMP_OUTPUT_ENV: &str = "ELFSIM_FAKE_OBJDUMP_OUTPUT";

/// Error type for the disassembly layer.
#[derive(Debug, Error)]
pub enum DisasmError {
    /// The binary path does not exist or is not a regular file.
    #[error("Binary not found at {0}")]
    MissingBinary(PathBuf),

    /// The path does not end in a recognized binary extension.
    #[error("Not a recognized binary file: {0}")]
    UnrecognizedExtension(PathBuf),

    /// The external disassembler could not be spawned or produced no
    /// readable output.
    #[error("Disassembler error: {0}")]
    Spawn(String),

    /// The disassembler ran but its output contained no instructions.
    /// Callers keep any previously loaded image; this error must never
    /// replace good state with an empty one.
    #[error("Disassembler produced no instructions")]
    EmptyDump,

    /// A disassembly of the same binary is already in flight; the new
    /// request is rejected rather than queued.
    #[error("Disassembly already in flight for {0}")]
    AlreadyInFlight(PathBuf),
}

/// Convenience result type for disassembly operations.
pub type DisasmResult<T> = Result<T, DisasmError>;

/// Toolchain settings consumed by the disassembly layer.
///
/// Owned by an external config collaborator and injected explicitly; the
/// engine never reads ambient global state for these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Directory holding the cross-toolchain binaries.
    pub toolchain_dir: PathBuf,
    /// Binary-name prefix (e.g. `riscv32-unknown-elf-`).
    pub prefix: String,
    /// Flag string passed to objdump, split on whitespace (e.g. `-d -S`).
    pub objdump_flags: String,
}

impl ToolchainConfig {
    /// Full path of the objdump executable for this toolchain.
    pub fn objdump_path(&self) -> PathBuf {
        self.toolchain_dir.join(format!("{}objdump", self.prefix))
    }
}

/// A request to disassemble one binary.
#[derive(Debug, Clone)]
pub struct DisasmRequest {
    /// Path to the binary to disassemble.
    pub binary_path: PathBuf,
    /// Working directory for the external process (the project folder).
    pub working_dir: PathBuf,
    /// Toolchain settings to resolve the invocation with.
    pub config: ToolchainConfig,
}

/// Raw output of one disassembler invocation.
#[derive(Debug, Clone)]
pub struct DumpOutput {
    /// stdout and stderr concatenated, in arrival order.
    pub text: String,
    /// Exit code of the process; informational only. A non-zero exit with
    /// usable output still parses; an empty output is fatal regardless.
    pub exit_code: Option<i32>,
}

/// Trait implemented by disassembler invocations (external objdump, test
/// doubles). The pipeline calls `dump` from its worker thread.
pub trait DisasmTool: Send + Sync {
    fn dump(&self, request: &DisasmRequest) -> DisasmResult<DumpOutput>;
    fn name(&self) -> &'static str;
}

/// The real thing: spawns the configured objdump with the flag string and
/// the binary path, cwd set to the project folder, and captures stdout and
/// stderr into one buffer.
pub struct ObjdumpTool;

impl ObjdumpTool {
    fn fake_output() -> Option<DisasmResult<DumpOutput>> {
        let path = std::env::var_os(FAKE_OBJDUMP_OUTPUT_ENV)?;
        Some(
            std::fs::read_to_string(&path)
                .map(|text| DumpOutput { text, exit_code: Some(0) })
                .map_err(|e| {
                    DisasmError::Spawn(format!("failed to read {FAKE_OBJDUMP_OUTPUT_ENV}: {e}"))
                }),
        )
    }
}

impl DisasmTool for ObjdumpTool {
    fn dump(&self, request: &DisasmRequest) -> DisasmResult<DumpOutput> {
        if let Some(fake) = Self::fake_output() {
            return fake;
        }

        let output = Command::new(request.config.objdump_path())
            .args(request.config.objdump_flags.split_whitespace())
            .arg(&request.binary_path)
            .current_dir(&request.working_dir)
            .output()
            .map_err(|e| DisasmError::Spawn(format!("failed to spawn objdump: {e}")))?;

        // The streams arrive as raw chunks; collapse them into one buffer
        // before any line-oriented parsing happens.
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(DumpOutput { text, exit_code: output.status.code() })
    }

    fn name(&self) -> &'static str {
        "objdump"
    }
}

/// Check that `path` exists and carries a recognized binary extension.
pub fn check_binary_path(path: &Path) -> DisasmResult<()> {
    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| BINARY_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false);
    if !recognized {
        return Err(DisasmError::UnrecognizedExtension(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(DisasmError::MissingBinary(path.to_path_buf()));
    }
    Ok(())
}
