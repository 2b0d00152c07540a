//! Binary Object Model: the typed representation of a disassembled ELF.
//!
//! A [`BinaryImage`] is built atomically by the disassembly pipeline from
//! one objdump-style text dump and owns its whole tree of sections,
//! symbols, code lines, and instructions. Images are replaced wholesale on
//! reload; nothing mutates one in place.

use serde::{Deserialize, Serialize};

/// Section flag for "this section contains executable instructions",
/// matching the ELF `SHF_EXECINSTR` bit.
pub const SHF_EXECINSTR: u32 = 0x4;

/// ELF-style section flag bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFlags(pub u32);

impl SectionFlags {
    /// Flags with only the executable bit set.
    pub fn executable() -> Self {
        Self(SHF_EXECINSTR)
    }

    /// True if the section holds machine instructions.
    pub fn is_executable(self) -> bool {
        self.0 & SHF_EXECINSTR != 0
    }
}

/// One machine instruction as it appeared in the disassembler's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Program-counter value this instruction occupies.
    pub address: u64,
    /// Raw encoding bytes as the hex string from the dump (e.g. `"13 05 a0 02"`).
    pub encoding: String,
    /// Mnemonic plus operand text (e.g. `"addi a0,zero,42"`).
    pub mnemonic: String,
}

/// Reference to the high-level source line a group of instructions came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source text as printed in the interleaved dump.
    pub text: String,
    /// 1-based line number in `file`.
    pub line: u32,
    /// Source file path as printed by the disassembler.
    pub file: String,
}

/// One high-level source line paired with the machine instructions it
/// disassembled to. A single line may map to multiple instructions
/// (inlining, multi-word encodings); an unannotated dump yields lines with
/// no `source` and exactly one instruction each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLine {
    pub source: Option<SourceRef>,
    pub instructions: Vec<Instruction>,
}

/// A symbol (function or anonymous code block) inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol name; `None` for anonymous code blocks.
    pub name: Option<String>,
    /// Starting address of the symbol.
    pub address: u64,
    /// Code lines in dump order. Instruction addresses are monotonically
    /// non-decreasing within a symbol.
    pub lines: Vec<CodeLine>,
}

impl Symbol {
    /// Iterate the symbol's instructions in dump order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().flat_map(|line| line.instructions.iter())
    }
}

/// A section of the binary, holding its symbols in dump order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub flags: SectionFlags,
    pub symbols: Vec<Symbol>,
}

/// An entire disassembled binary: ordered sections owning all symbols,
/// code lines, and instructions transitively.
///
/// Instruction addresses are globally unique across a well-formed image;
/// the instruction index relies on this to be a valid total function from
/// address to instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
    pub sections: Vec<Section>,
}

impl BinaryImage {
    /// Iterate every instruction in the image in dump order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.sections
            .iter()
            .flat_map(|section| section.symbols.iter())
            .flat_map(|symbol| symbol.instructions())
    }

    /// Total number of instructions across all sections.
    pub fn instruction_count(&self) -> usize {
        self.instructions().count()
    }

    /// Address of the first instruction in the image, if any.
    ///
    /// The dump preserves link order, so this is the entry point for the
    /// flat firmware images the engine targets.
    pub fn entry_pc(&self) -> Option<u64> {
        self.instructions().next().map(|instr| instr.address)
    }
}
