//! elfsim-core
//!
//! Simulation engine for an embedded-toolchain IDE.
//!
//! This crate turns an objdump-style text dump of a compiled ELF into an
//! addressable instruction index, and drives a CPU model forward one clock
//! cycle or one instruction at a time while keeping the instruction index,
//! the memory view, and the program counter consistent:
//!
//! - `model`: the Binary Object Model (sections, symbols, instructions).
//! - `disasm`: external-disassembler invocation, output parsing, and the
//!   single-flight background pipeline.
//! - `index`: address -> instruction lookup over a loaded image.
//! - `sim`: the simulation controller and the CPU core channel contract.
//! - `memview`: read-only hex/ASCII formatting of the live memory image.
//! - `focus`: program-counter change resolution for highlight/scroll.
//! - `cache`: persisted disassembly results keyed by binary path.
//!
//! The goal is to keep all substantive logic here so it is fully testable
//! and reusable from multiple frontends (CLI, IDE shell, etc.).

pub mod cache;
pub mod disasm;
pub mod focus;
pub mod index;
pub mod memview;
pub mod model;
pub mod sim;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
