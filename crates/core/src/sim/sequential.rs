//! A deliberately simple reference core for tests and the CLI.
//!
//! The production CPU core is an external simulator reached over the
//! [`CpuCore`](crate::sim::CpuCore) channel; this one stands in for it the
//! way a validate-only backend stands in for a real analyzer. It knows
//! nothing about instruction semantics: it walks the instruction addresses
//! of a disassembled image in ascending order, halts on break-style
//! mnemonics, past the last instruction, and at an installed breakpoint
//! address, and serves the raw binary file as its memory image.

use std::collections::HashSet;
use std::fs;

use crate::model::BinaryImage;
use crate::sim::{CoreRequest, CoreResponse, CpuCore, REGISTER_COUNT};

/// Mnemonics the core treats as a halt condition.
const BREAK_MNEMONICS: &[&str] = &["ebreak", "break", "bkpt", "hlt"];

/// Address-table core over one disassembled image.
#[derive(Debug)]
pub struct SequentialCore {
    /// Instruction addresses in ascending order.
    addresses: Vec<u64>,
    /// Addresses whose instruction is a break-style mnemonic.
    break_addrs: HashSet<u64>,
    /// Optional explicit breakpoint address.
    breakpoint: Option<u64>,
    cycles_per_instruction: u32,
    clocks_into_instruction: u32,
    memory: Vec<u8>,
    registers: Vec<u32>,
    pc: u64,
    entry_pc: u64,
    loaded: bool,
}

impl SequentialCore {
    /// Build a core over `image`'s instruction addresses.
    pub fn new(image: &BinaryImage) -> Self {
        let mut addresses: Vec<u64> = image.instructions().map(|i| i.address).collect();
        let break_addrs = image
            .instructions()
            .filter(|i| {
                let head = i.mnemonic.split_whitespace().next().unwrap_or("");
                BREAK_MNEMONICS.iter().any(|b| head.eq_ignore_ascii_case(b))
            })
            .map(|i| i.address)
            .collect();
        addresses.sort_unstable();
        addresses.dedup();
        let entry_pc = image.entry_pc().unwrap_or(0);
        Self {
            addresses,
            break_addrs,
            breakpoint: None,
            cycles_per_instruction: 1,
            clocks_into_instruction: 0,
            memory: Vec::new(),
            registers: vec![0; REGISTER_COUNT],
            pc: entry_pc,
            entry_pc,
            loaded: false,
        }
    }

    /// Make every instruction take `cycles` clock steps (minimum 1), so
    /// clock stepping exercises sub-instruction behavior.
    pub fn with_cycles_per_instruction(mut self, cycles: u32) -> Self {
        self.cycles_per_instruction = cycles.max(1);
        self
    }

    /// Install or clear the breakpoint address the core halts at.
    pub fn set_breakpoint(&mut self, target: Option<u64>) {
        self.breakpoint = target;
    }

    /// Halt condition at the current pc: break mnemonic, explicit
    /// breakpoint, or no successor instruction.
    fn at_halt(&self) -> bool {
        if self.break_addrs.contains(&self.pc) {
            return true;
        }
        if self.breakpoint == Some(self.pc) {
            return true;
        }
        match self.addresses.binary_search(&self.pc) {
            Ok(idx) => idx + 1 >= self.addresses.len(),
            // pc off the instruction table entirely; nowhere to go.
            Err(_) => true,
        }
    }

    fn step_instruction(&mut self) -> CoreResponse {
        if !self.loaded {
            return CoreResponse::Error("no binary loaded".into());
        }
        if self.at_halt() {
            return CoreResponse::Halted { pc: self.pc };
        }
        let idx = match self.addresses.binary_search(&self.pc) {
            Ok(idx) => idx,
            Err(_) => return CoreResponse::Error(format!("pc {:#x} is mid-instruction", self.pc)),
        };
        self.pc = self.addresses[idx + 1];
        // A real core would retire register writes here; this one only
        // tracks the instruction counter register for visibility.
        self.registers[REGISTER_COUNT - 1] = self.registers[REGISTER_COUNT - 1].wrapping_add(1);
        CoreResponse::Stepped { pc: self.pc, registers: self.registers.clone() }
    }

    fn step_clock(&mut self) -> CoreResponse {
        if !self.loaded {
            return CoreResponse::Error("no binary loaded".into());
        }
        self.clocks_into_instruction += 1;
        if self.clocks_into_instruction < self.cycles_per_instruction {
            // Sub-instruction clock: state latches internally, pc holds.
            return CoreResponse::Stepped { pc: self.pc, registers: self.registers.clone() };
        }
        self.clocks_into_instruction = 0;
        self.step_instruction()
    }
}

impl CpuCore for SequentialCore {
    fn request(&mut self, request: CoreRequest) -> CoreResponse {
        match request {
            CoreRequest::Load(path) => match fs::read(&path) {
                Ok(bytes) => {
                    self.memory = bytes;
                    self.registers = vec![0; REGISTER_COUNT];
                    self.pc = self.entry_pc;
                    self.clocks_into_instruction = 0;
                    self.loaded = true;
                    CoreResponse::Loaded { entry_pc: self.entry_pc }
                }
                Err(e) => CoreResponse::Error(format!("cannot read {}: {e}", path.display())),
            },
            CoreRequest::StepInstruction => self.step_instruction(),
            CoreRequest::StepClock => self.step_clock(),
            CoreRequest::ReadMemory { start, len } => {
                let start = (start as usize).min(self.memory.len());
                let end = start.saturating_add(len).min(self.memory.len());
                CoreResponse::MemorySnapshot(self.memory[start..end].to_vec())
            }
            CoreRequest::Halt => CoreResponse::Halted { pc: self.pc },
        }
    }
}
