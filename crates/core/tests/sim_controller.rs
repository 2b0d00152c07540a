use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use elfsim_core::disasm::parse_dump;
use elfsim_core::index::InstructionIndex;
use elfsim_core::model::BinaryImage;
use elfsim_core::sim::{
    spawn_core, CoreRequest, CoreResponse, CpuCore, PcObserver, SequentialCore, SimError,
    SimPhase, SimulationController, REGISTER_COUNT,
};

const DUMP: &str = "\
Disassembly of section .text:\n\
00001000 <main>:\n\
    1000:\t93 08 00 00\tli\ts1,0\n\
    1004:\t13 05 a0 02\taddi\ta0,zero,42\n\
    1008:\t23 26 a4 00\tsw\ta0,12(s0)\n\
    100c:\t13 00 00 00\tnop\n\
    1010:\t73 00 10 00\tebreak\n";

struct Harness {
    controller: SimulationController,
    image: BinaryImage,
    binary: tempfile::NamedTempFile,
}

fn harness() -> Harness {
    let image = parse_dump(DUMP).expect("parse");
    let core = SequentialCore::new(&image);
    let binary = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(binary.path(), b"\x93\x08\x00\x00\x13\x05\xa0\x02").expect("write binary");
    Harness { controller: SimulationController::new(Box::new(core)), image, binary }
}

/// Shared recorder so tests can inspect notifications after handing the
/// observer to the controller.
#[derive(Default, Clone)]
struct Recorder(Rc<RefCell<Vec<(u64, u64)>>>);

impl PcObserver for Recorder {
    fn pc_changed(&mut self, old_pc: u64, new_pc: u64) {
        self.0.borrow_mut().push((old_pc, new_pc));
    }
}

/// Init lands on 0x1000, one instruction step lands on 0x1004, and the
/// index agrees about both addresses.
#[test]
fn init_step_and_index_agree_on_the_scenario_binary() {
    let mut h = harness();
    let index = InstructionIndex::build(&h.image);

    let entry = h.controller.init_simulation(h.binary.path()).expect("init");
    assert_eq!(entry, 0x1000);
    assert_eq!(h.controller.phase(), SimPhase::Loaded);
    assert_eq!(h.controller.cpu().pc, 0x1000);
    assert_eq!(h.controller.cpu().registers, vec![0; REGISTER_COUNT]);
    assert!(!h.controller.cpu().memory.is_empty());

    let change = h.controller.advance_simulation_pc().expect("step");
    assert_eq!(change.old_pc, 0x1000);
    assert_eq!(change.new_pc, 0x1004);

    assert_eq!(index.resolve(&h.image, 0x1004).unwrap().mnemonic, "addi a0,zero,42");
    assert_eq!(index.lookup(0x1002), None);
}

/// Stepping before any load is rejected with NotLoaded.
#[test]
fn stepping_in_idle_phase_is_rejected() {
    let mut h = harness();
    assert!(matches!(h.controller.advance_simulation_pc(), Err(SimError::NotLoaded)));
    assert!(matches!(h.controller.advance_simulation_clock(), Err(SimError::NotLoaded)));
    assert!(matches!(h.controller.run_until_pc(0x1004, 10), Err(SimError::NotLoaded)));
    let stop = AtomicBool::new(false);
    assert!(matches!(h.controller.run_until_break(&stop), Err(SimError::NotLoaded)));
}

/// N single instruction steps equal one `run_until_pc` to the same
/// address, including the full CPU state.
#[test]
fn n_single_steps_match_one_bulk_run() {
    let mut stepped = harness();
    stepped.controller.init_simulation(stepped.binary.path()).expect("init");
    for _ in 0..3 {
        stepped.controller.advance_simulation_pc().expect("step");
    }

    let mut bulk = harness();
    bulk.controller.init_simulation(bulk.binary.path()).expect("init");
    let outcome = bulk.controller.run_until_pc(0x100c, 100).expect("run");
    assert_eq!(outcome.steps, 3);
    assert_eq!(outcome.final_pc, 0x100c);
    assert!(!outcome.halted);

    assert_eq!(stepped.controller.cpu().pc, 0x100c);
    // Identical step counts must produce identical CPU state; the two
    // harnesses loaded the same bytes from disk.
    assert_eq!(
        stepped.controller.cpu().registers[REGISTER_COUNT - 1],
        bulk.controller.cpu().registers[REGISTER_COUNT - 1],
    );
    assert_eq!(stepped.controller.cpu().memory, bulk.controller.cpu().memory);
    assert_eq!(bulk.controller.phase(), SimPhase::Loaded);
}

/// Single steps notify per step; a bulk run emits exactly one terminal
/// notification spanning the whole run.
#[test]
fn bulk_runs_suppress_per_step_notifications() {
    let recorder = Recorder::default();

    let mut h = harness();
    h.controller.set_observer(Box::new(recorder.clone()));
    h.controller.init_simulation(h.binary.path()).expect("init");

    h.controller.advance_simulation_pc().expect("step");
    h.controller.advance_simulation_pc().expect("step");
    assert_eq!(*recorder.0.borrow(), vec![(0x1000, 0x1004), (0x1004, 0x1008)]);

    recorder.0.borrow_mut().clear();
    h.controller.run_until_pc(0x1010, 100).expect("run");
    assert_eq!(*recorder.0.borrow(), vec![(0x1008, 0x1010)]);
}

/// Clock steps notify only when the pc actually moved.
#[test]
fn clock_steps_notify_only_on_pc_change() {
    let image = parse_dump(DUMP).expect("parse");
    let core = SequentialCore::new(&image).with_cycles_per_instruction(2);
    let binary = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(binary.path(), b"x").expect("write");

    let recorder = Recorder::default();
    let mut controller = SimulationController::new(Box::new(core));
    controller.set_observer(Box::new(recorder.clone()));
    controller.init_simulation(binary.path()).expect("init");

    let first = controller.advance_simulation_clock().expect("clock 1");
    assert!(!first.changed());
    assert!(recorder.0.borrow().is_empty());

    let second = controller.advance_simulation_clock().expect("clock 2");
    assert!(second.changed());
    assert_eq!(*recorder.0.borrow(), vec![(0x1000, 0x1004)]);
}

/// An unreachable target exhausts the iteration bound and reports
/// RunTimeout, not a step failure. Uses a core that loops forever so the
/// bound is the only thing stopping it.
#[test]
fn unreachable_target_times_out() {
    struct LoopCore {
        pc: u64,
    }
    impl CpuCore for LoopCore {
        fn request(&mut self, request: CoreRequest) -> CoreResponse {
            match request {
                CoreRequest::Load(_) => CoreResponse::Loaded { entry_pc: self.pc },
                CoreRequest::StepInstruction | CoreRequest::StepClock => {
                    // Two-instruction loop that never leaves 0x1000..=0x1004.
                    self.pc = if self.pc == 0x1000 { 0x1004 } else { 0x1000 };
                    CoreResponse::Stepped { pc: self.pc, registers: vec![0; REGISTER_COUNT] }
                }
                CoreRequest::ReadMemory { .. } => CoreResponse::MemorySnapshot(Vec::new()),
                CoreRequest::Halt => CoreResponse::Halted { pc: self.pc },
            }
        }
    }

    let mut controller = SimulationController::new(Box::new(LoopCore { pc: 0x1000 }));
    controller.init_simulation(&PathBuf::from("ignored.elf")).expect("init");
    match controller.run_until_pc(0x9999, 50) {
        Err(SimError::RunTimeout { target, steps }) => {
            assert_eq!(target, 0x9999);
            assert_eq!(steps, 50);
        }
        other => panic!("expected RunTimeout, got {other:?}"),
    }
    // Timeout still leaves a consistent, steppable state behind.
    assert_eq!(controller.phase(), SimPhase::Loaded);
    assert!(!controller.cpu().running);
    controller.advance_simulation_pc().expect("still steppable");
}

/// A breakpoint installed on the controller halts a free run at exactly
/// that address, before the program's own break instruction.
#[test]
fn run_until_break_halts_at_an_installed_breakpoint() {
    let mut h = harness();
    h.controller.init_simulation(h.binary.path()).expect("init");
    h.controller.set_breakpoint(Some(0x1008));

    let stop = AtomicBool::new(false);
    let outcome = h.controller.run_until_break(&stop).expect("run");
    assert!(outcome.halted);
    assert_eq!(outcome.final_pc, 0x1008);
    assert_eq!(outcome.steps, 2);
    assert_eq!(h.controller.phase(), SimPhase::Halted);

    // Resuming steps off the breakpoint and runs on to the ebreak.
    let outcome = h.controller.run_until_break(&stop).expect("resume");
    assert!(outcome.halted);
    assert_eq!(outcome.final_pc, 0x1010);
}

/// run_until_pc borrows the breakpoint slot for its target and hands the
/// installed breakpoint back afterwards, still armed.
#[test]
fn run_until_pc_restores_the_installed_breakpoint() {
    let mut h = harness();
    h.controller.init_simulation(h.binary.path()).expect("init");
    h.controller.set_breakpoint(Some(0x100c));

    h.controller.run_until_pc(0x1004, 100).expect("run");
    assert_eq!(h.controller.cpu().breakpoint, Some(0x100c));

    // The restored breakpoint still halts a subsequent free run, at the
    // nop rather than the ebreak behind it.
    let stop = AtomicBool::new(false);
    let outcome = h.controller.run_until_break(&stop).expect("run");
    assert!(outcome.halted);
    assert_eq!(outcome.final_pc, 0x100c);
    assert_eq!(h.controller.phase(), SimPhase::Halted);
}

/// When the stepping loop and the post-run memory refresh both fail, the
/// loop's fault is the one reported.
#[test]
fn bulk_run_reports_the_step_fault_even_when_memory_refresh_fails() {
    struct FaultyCore {
        faulted: bool,
    }
    impl CpuCore for FaultyCore {
        fn request(&mut self, request: CoreRequest) -> CoreResponse {
            match request {
                CoreRequest::Load(_) => CoreResponse::Loaded { entry_pc: 0x1000 },
                CoreRequest::StepInstruction | CoreRequest::StepClock => {
                    self.faulted = true;
                    CoreResponse::Error("bus fault".into())
                }
                CoreRequest::ReadMemory { .. } if self.faulted => {
                    CoreResponse::Error("memory offline".into())
                }
                CoreRequest::ReadMemory { .. } => CoreResponse::MemorySnapshot(Vec::new()),
                CoreRequest::Halt => CoreResponse::Halted { pc: 0x1000 },
            }
        }
    }

    let mut controller = SimulationController::new(Box::new(FaultyCore { faulted: false }));
    controller.init_simulation(&PathBuf::from("ignored.elf")).expect("init");
    match controller.run_until_pc(0x2000, 10) {
        Err(SimError::Step(reason)) => assert_eq!(reason, "bus fault"),
        other => panic!("expected the step fault, got {other:?}"),
    }
    assert_eq!(controller.phase(), SimPhase::Loaded);
    assert!(!controller.cpu().running);
}

/// run_until_break halts at the break-style instruction and parks the
/// phase in Halted.
#[test]
fn run_until_break_halts_on_ebreak() {
    let mut h = harness();
    h.controller.init_simulation(h.binary.path()).expect("init");

    let stop = AtomicBool::new(false);
    let outcome = h.controller.run_until_break(&stop).expect("run");
    assert!(outcome.halted);
    assert_eq!(outcome.final_pc, 0x1010);
    assert_eq!(h.controller.phase(), SimPhase::Halted);
    assert!(!h.controller.cpu().running);
}

/// A raised stop flag cancels the run at an instruction boundary and
/// returns to Loaded without reaching the halt.
#[test]
fn stop_request_cancels_run_until_break() {
    let mut h = harness();
    h.controller.init_simulation(h.binary.path()).expect("init");

    let stop = AtomicBool::new(true);
    let outcome = h.controller.run_until_break(&stop).expect("run");
    assert_eq!(outcome.steps, 0);
    assert!(!outcome.halted);
    assert_eq!(h.controller.phase(), SimPhase::Loaded);
    // The pc sits exactly where it was: a clean post-instruction boundary.
    assert_eq!(h.controller.cpu().pc, 0x1000);
    stop.store(false, Ordering::SeqCst);
    h.controller.advance_simulation_pc().expect("resumes normally");
}

/// A load the core rejects leaves the previous session untouched.
#[test]
fn failed_load_preserves_previous_state() {
    let mut h = harness();
    h.controller.init_simulation(h.binary.path()).expect("init");
    h.controller.advance_simulation_pc().expect("step");
    let pc_before = h.controller.cpu().pc;

    // SequentialCore rejects unreadable paths with a core error.
    let missing = PathBuf::from("/nonexistent/prog.elf");
    assert!(matches!(h.controller.init_simulation(&missing), Err(SimError::Load(_))));
    assert_eq!(h.controller.cpu().pc, pc_before);
    assert_eq!(h.controller.phase(), SimPhase::Loaded);
}

/// The controller drives a core served over channels on another thread
/// exactly like an in-process one.
#[test]
fn channel_core_round_trips_the_protocol() {
    let image = parse_dump(DUMP).expect("parse");
    let binary = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(binary.path(), b"\x00\x01\x02\x03").expect("write");

    let proxy = spawn_core(SequentialCore::new(&image));
    let mut controller = SimulationController::new(Box::new(proxy));
    assert_eq!(controller.init_simulation(binary.path()).expect("init"), 0x1000);
    let change = controller.advance_simulation_pc().expect("step");
    assert_eq!(change.new_pc, 0x1004);
    assert_eq!(controller.cpu().memory, vec![0x00, 0x01, 0x02, 0x03]);
}
