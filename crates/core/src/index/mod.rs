//! Instruction Index: address -> instruction lookup over a loaded image.
//!
//! The index replaces the "find the row for this program counter" lookup a
//! UI would otherwise hand-roll. It is derived data: built once per
//! [`BinaryImage`] in O(n) and rebuilt whenever a new image is installed.
//! Entries are positional ([`InstrLoc`]) rather than references, so the
//! index never borrows from its image; `resolve` takes the image
//! explicitly and a caller that swaps images simply rebuilds.
//!
//! Read-only after construction, so it can be queried concurrently with
//! simulation stepping.

use std::collections::HashMap;

use crate::model::{BinaryImage, Instruction};

/// Positional reference to one instruction inside a [`BinaryImage`]:
/// section, symbol, and code-line indices plus the slot within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrLoc {
    pub section: usize,
    pub symbol: usize,
    pub line: usize,
    pub slot: usize,
}

/// Mapping from instruction address to its location in the owning image.
#[derive(Debug, Clone, Default)]
pub struct InstructionIndex {
    by_addr: HashMap<u64, InstrLoc>,
}

impl InstructionIndex {
    /// Build the index for `image` in one O(n) pass.
    ///
    /// Well-formed images have globally unique instruction addresses; if a
    /// malformed dump repeats an address, the first occurrence wins.
    pub fn build(image: &BinaryImage) -> Self {
        let mut by_addr = HashMap::with_capacity(image.instruction_count());
        for (si, section) in image.sections.iter().enumerate() {
            for (yi, symbol) in section.symbols.iter().enumerate() {
                for (li, line) in symbol.lines.iter().enumerate() {
                    for (slot, instr) in line.instructions.iter().enumerate() {
                        by_addr
                            .entry(instr.address)
                            .or_insert(InstrLoc { section: si, symbol: yi, line: li, slot });
                    }
                }
            }
        }
        Self { by_addr }
    }

    /// Look up the location of the instruction at exactly `address`.
    ///
    /// Addresses that fall between two instructions (e.g. a mid-instruction
    /// breakpoint address) return `None`; callers decide any fallback.
    pub fn lookup(&self, address: u64) -> Option<InstrLoc> {
        self.by_addr.get(&address).copied()
    }

    /// Resolve `address` to the instruction itself within `image`.
    ///
    /// Returns `None` both for unknown addresses and for locations that do
    /// not exist in `image` (i.e. the index was built for a different
    /// image and should have been rebuilt).
    pub fn resolve<'a>(&self, image: &'a BinaryImage, address: u64) -> Option<&'a Instruction> {
        let loc = self.lookup(address)?;
        image
            .sections
            .get(loc.section)?
            .symbols
            .get(loc.symbol)?
            .lines
            .get(loc.line)?
            .instructions
            .get(loc.slot)
    }

    /// True if `address` is the start of a known instruction.
    pub fn contains(&self, address: u64) -> bool {
        self.by_addr.contains_key(&address)
    }

    /// Number of indexed instructions.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    /// True if the index holds no instructions.
    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}
