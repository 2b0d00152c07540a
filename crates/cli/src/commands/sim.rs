use anyhow::{Context, Result};

use elfsim_core::focus::focus_change;
use elfsim_core::index::InstructionIndex;
use elfsim_core::sim::{SequentialCore, SimulationController};

use crate::commands::disassemble_binary;
use crate::{parse_address, resolve_toolchain};

/// Toolchain-related arguments shared by the simulation subcommands.
pub struct ToolchainArgs<'a> {
    pub config_file: Option<&'a str>,
    pub toolchain_dir: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub flags: Option<&'a str>,
}

fn prepared_controller(
    binary: &str,
    toolchain: &ToolchainArgs<'_>,
) -> Result<(SimulationController, InstructionIndex)> {
    let config = resolve_toolchain(
        toolchain.config_file,
        toolchain.toolchain_dir,
        toolchain.prefix,
        toolchain.flags,
    )?;
    let (binary_path, outcome) = disassemble_binary(binary, config)?;

    let index = InstructionIndex::build(&outcome.image);
    let mut controller = SimulationController::new(Box::new(SequentialCore::new(&outcome.image)));
    let entry = controller
        .init_simulation(&binary_path)
        .with_context(|| format!("Failed to load {} into the simulator", binary_path.display()))?;
    println!("Loaded {} (entry pc {entry:#x})", binary_path.display());
    Ok((controller, index))
}

/// Disassemble a binary, load it into the reference core, and run until
/// the program counter reaches `until_pc` (bounded by `max_steps`).
pub fn run_command(
    binary: &str,
    until_pc: &str,
    max_steps: u64,
    toolchain: &ToolchainArgs<'_>,
) -> Result<()> {
    let target = parse_address(until_pc)?;
    let (mut controller, _) = prepared_controller(binary, toolchain)?;

    let outcome = controller
        .run_until_pc(target, max_steps)
        .with_context(|| format!("Run toward {target:#x} failed"))?;

    println!("Ran {} step(s): {:#x} -> {:#x}", outcome.steps, outcome.start_pc, outcome.final_pc);
    if outcome.halted {
        println!("Core halted at {:#x}", outcome.final_pc);
    }
    Ok(())
}

/// Disassemble a binary, load it, and execute `count` single steps,
/// printing the pc trace and the focus transitions each step resolved.
pub fn step_command(
    binary: &str,
    count: u64,
    clock: bool,
    toolchain: &ToolchainArgs<'_>,
) -> Result<()> {
    let (mut controller, index) = prepared_controller(binary, toolchain)?;

    for n in 1..=count {
        let change = if clock {
            controller.advance_simulation_clock().context("Clock step failed")?
        } else {
            controller.advance_simulation_pc().context("Instruction step failed")?
        };

        print!("step {n}: pc {:#x} -> {:#x}", change.old_pc, change.new_pc);
        let focus = focus_change(change.old_pc, change.new_pc, &index);
        match (focus.leave, focus.enter) {
            (Some(leave), Some(enter)) => print!("  (leave {leave:#x}, enter {enter:#x})"),
            (None, Some(enter)) => print!("  (enter {enter:#x})"),
            (Some(leave), None) => print!("  (leave {leave:#x})"),
            (None, None) => {}
        }
        println!();
    }
    Ok(())
}
