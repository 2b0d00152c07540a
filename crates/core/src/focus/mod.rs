//! Highlight/Scroll Coordinator: resolves program-counter changes into
//! focus transitions over the instruction index.
//!
//! Rendering (animation, scrolling) is out of scope; this is the pure
//! resolution half: given `(old_pc, new_pc)`, which instruction row loses
//! focus and which gains it. Addresses that do not resolve — like the
//! `old_pc = 0` sentinel right after a load — are skipped rather than
//! treated as errors.

use crate::index::InstructionIndex;
use crate::sim::PcObserver;

/// A focus transition between two instruction rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusChange {
    /// Address losing focus, if it resolved to an instruction.
    pub leave: Option<u64>,
    /// Address gaining focus, if it resolved to an instruction.
    pub enter: Option<u64>,
}

/// Resolve `(old_pc, new_pc)` through the index.
///
/// Idempotent: `old_pc == new_pc` only re-confirms the current focus (no
/// leave half), so repeated notifications for the same pc are harmless.
pub fn focus_change(old_pc: u64, new_pc: u64, index: &InstructionIndex) -> FocusChange {
    let enter = index.contains(new_pc).then_some(new_pc);
    let leave = if old_pc == new_pc {
        None
    } else {
        index.contains(old_pc).then_some(old_pc)
    };
    FocusChange { leave, enter }
}

/// Observer that turns controller pc notifications into a queue of
/// [`FocusChange`] events for a frontend to drain.
#[derive(Debug, Default)]
pub struct FocusCoordinator {
    index: InstructionIndex,
    events: Vec<FocusChange>,
}

impl FocusCoordinator {
    pub fn new(index: InstructionIndex) -> Self {
        Self { index, events: Vec::new() }
    }

    /// Swap in the index for a freshly installed image.
    pub fn set_index(&mut self, index: InstructionIndex) {
        self.index = index;
    }

    /// Drain the queued focus events in arrival order.
    pub fn take_events(&mut self) -> Vec<FocusChange> {
        std::mem::take(&mut self.events)
    }
}

impl PcObserver for FocusCoordinator {
    fn pc_changed(&mut self, old_pc: u64, new_pc: u64) {
        self.events.push(focus_change(old_pc, new_pc, &self.index));
    }
}
