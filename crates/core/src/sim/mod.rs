//! Simulation Controller: owns CPU state and drives the external CPU core.
//!
//! The actual instruction-set semantics live in an external core reached
//! through the [`CpuCore`] request/response contract; this module owns the
//! `{Idle, Loaded, Running, Halted}` state machine around it, mutates
//! [`CpuState`] exclusively, and notifies a [`PcObserver`] about
//! program-counter changes. All other components (memory view, highlight
//! coordinator) are read-only observers of `CpuState`.

mod sequential;

pub use sequential::SequentialCore;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use thiserror::Error;

/// Number of general-purpose registers in the register file.
pub const REGISTER_COUNT: usize = 32;

/// Default iteration bound for [`SimulationController::run_until_pc`].
pub const DEFAULT_MAX_RUN_STEPS: u64 = 100_000;

/// Requests the controller sends to the external CPU core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreRequest {
    /// Load the binary at the given path and reset the core.
    Load(PathBuf),
    /// Execute exactly one instruction.
    StepInstruction,
    /// Execute exactly one clock cycle (may be a sub-instruction step).
    StepClock,
    /// Read `len` bytes of memory starting at `start`; cores clamp the
    /// range to their memory size.
    ReadMemory { start: u64, len: usize },
    /// Stop the core; it may shut down after acknowledging.
    Halt,
}

/// Responses the external CPU core sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreResponse {
    /// Binary accepted; execution starts at `entry_pc`.
    Loaded { entry_pc: u64 },
    /// One step completed.
    Stepped { pc: u64, registers: Vec<u32> },
    /// Snapshot of the requested memory range.
    MemorySnapshot(Vec<u8>),
    /// The core hit a breakpoint/halt condition; `pc` is the halt address.
    Halted { pc: u64 },
    /// The core rejected the request (bad format, illegal instruction, ...).
    Error(String),
}

/// The narrow contract to the external CPU core. Each call is a
/// synchronous request/response exchange; the controller owns the core
/// exclusively, so nothing else can block on it.
pub trait CpuCore: Send {
    fn request(&mut self, request: CoreRequest) -> CoreResponse;
}

/// Proxy that forwards [`CpuCore`] requests over channels to a core
/// serving on another thread — the IPC-like shape the production core
/// (a simulator process) is reached through.
pub struct ChannelCore {
    tx: Sender<CoreRequest>,
    rx: Receiver<CoreResponse>,
}

impl CpuCore for ChannelCore {
    fn request(&mut self, request: CoreRequest) -> CoreResponse {
        if self.tx.send(request).is_err() {
            return CoreResponse::Error("cpu core channel closed".into());
        }
        self.rx
            .recv()
            .unwrap_or_else(|_| CoreResponse::Error("cpu core channel closed".into()))
    }
}

/// Serve `core` on a background thread and return the channel proxy to it.
///
/// The serving loop ends when the proxy is dropped or after answering a
/// [`CoreRequest::Halt`].
pub fn spawn_core(mut core: impl CpuCore + 'static) -> ChannelCore {
    let (req_tx, req_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    thread::spawn(move || {
        for request in req_rx {
            let is_halt = matches!(request, CoreRequest::Halt);
            if resp_tx.send(core.request(request)).is_err() || is_halt {
                break;
            }
        }
    });
    ChannelCore { tx: req_tx, rx: resp_rx }
}

/// Error type for simulation operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// A stepping call arrived before any binary was loaded.
    #[error("No binary loaded into the simulation")]
    NotLoaded,

    /// The external core rejected the binary.
    #[error("CPU core rejected the binary: {0}")]
    Load(String),

    /// The external core reported a fault while stepping.
    #[error("CPU core step failed: {0}")]
    Step(String),

    /// `run_until_pc` exhausted its iteration bound without reaching the
    /// target. Distinct from `Step`: the core is healthy, the target was
    /// simply never reached.
    #[error("Run did not reach pc {target:#x} within {steps} steps")]
    RunTimeout { target: u64, steps: u64 },

    /// The core answered with something the protocol does not allow here.
    #[error("Unexpected CPU core response: {0}")]
    Protocol(String),
}

/// Convenience result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

/// Live CPU state, mutated exclusively by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    /// Current program counter.
    pub pc: u64,
    /// Register file; `REGISTER_COUNT` entries, zeroed on load.
    pub registers: Vec<u32>,
    /// Raw memory image addressed from 0.
    pub memory: Vec<u8>,
    /// True while a bulk run is executing.
    pub running: bool,
    /// Target address automatic execution should halt at, if any.
    pub breakpoint: Option<u64>,
}

impl CpuState {
    fn reset(entry_pc: u64) -> Self {
        Self {
            pc: entry_pc,
            registers: vec![0; REGISTER_COUNT],
            memory: Vec::new(),
            running: false,
            breakpoint: None,
        }
    }
}

/// Phases of the simulation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPhase {
    /// No binary loaded; every stepping call is rejected.
    Idle,
    /// Binary loaded, ready to step.
    Loaded,
    /// A bulk run (`run_until_pc` / `run_until_break`) is executing.
    Running,
    /// The core reported a breakpoint/halt condition.
    Halted,
}

/// Observer for program-counter changes; the highlight coordinator plugs
/// in here. Bulk runs suppress per-step notifications and emit exactly
/// one terminal `(start_pc, final_pc)` call.
pub trait PcObserver {
    fn pc_changed(&mut self, old_pc: u64, new_pc: u64);
}

/// Outcome of a single stepping operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcChange {
    pub old_pc: u64,
    pub new_pc: u64,
}

impl PcChange {
    pub fn changed(self) -> bool {
        self.old_pc != self.new_pc
    }
}

/// Outcome of a bulk run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Instructions executed during the run.
    pub steps: u64,
    pub start_pc: u64,
    pub final_pc: u64,
    /// True if the run ended because the core reported a halt condition
    /// (as opposed to reaching the target or being stopped).
    pub halted: bool,
}

/// The simulation state machine; see module docs.
pub struct SimulationController {
    core: Box<dyn CpuCore>,
    phase: SimPhase,
    cpu: CpuState,
    observer: Option<Box<dyn PcObserver>>,
}

impl SimulationController {
    pub fn new(core: Box<dyn CpuCore>) -> Self {
        Self { core, phase: SimPhase::Idle, cpu: CpuState::reset(0), observer: None }
    }

    pub fn phase(&self) -> SimPhase {
        self.phase
    }

    /// Read-only view of the live CPU state.
    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    /// Install the observer notified about program-counter changes.
    pub fn set_observer(&mut self, observer: Box<dyn PcObserver>) {
        self.observer = Some(observer);
    }

    /// Take the observer back out (e.g. to drain its queued events).
    pub fn take_observer(&mut self) -> Option<Box<dyn PcObserver>> {
        self.observer.take()
    }

    /// Record the breakpoint target automatic execution should halt at.
    pub fn set_breakpoint(&mut self, target: Option<u64>) {
        self.cpu.breakpoint = target;
    }

    /// `Idle -> Loaded`: load the binary into the external core and reset
    /// CPU state (registers zeroed, pc at entry, memory populated).
    ///
    /// On failure the previous CPU state and phase stay untouched.
    pub fn init_simulation(&mut self, binary_path: &Path) -> SimResult<u64> {
        match self.core.request(CoreRequest::Load(binary_path.to_path_buf())) {
            CoreResponse::Loaded { entry_pc } => {
                self.cpu = CpuState::reset(entry_pc);
                self.phase = SimPhase::Loaded;
                self.refresh_memory()?;
                Ok(entry_pc)
            }
            CoreResponse::Error(reason) => Err(SimError::Load(reason)),
            other => Err(SimError::Protocol(format!("{other:?} in response to Load"))),
        }
    }

    /// Execute exactly one instruction at the current program counter.
    ///
    /// Notifies the observer with `(old_pc, new_pc)` unconditionally.
    pub fn advance_simulation_pc(&mut self) -> SimResult<PcChange> {
        self.ensure_loaded()?;
        let change = self.step_once(CoreRequest::StepInstruction)?;
        self.refresh_memory()?;
        self.notify(change.old_pc, change.new_pc);
        Ok(change)
    }

    /// Execute exactly one clock cycle (a sub-instruction step on
    /// multi-cycle cores).
    ///
    /// The observer fires only if the program counter actually changed.
    pub fn advance_simulation_clock(&mut self) -> SimResult<PcChange> {
        self.ensure_loaded()?;
        let change = self.step_once(CoreRequest::StepClock)?;
        self.refresh_memory()?;
        if change.changed() {
            self.notify(change.old_pc, change.new_pc);
        }
        Ok(change)
    }

    /// `Loaded -> Running -> Loaded`: step by instruction until the
    /// program counter equals `target` or `max_steps` is exhausted
    /// ([`SimError::RunTimeout`] — the guard against unreachable targets).
    ///
    /// The target acts as the breakpoint for the duration of the run; any
    /// breakpoint installed via [`set_breakpoint`](Self::set_breakpoint)
    /// is restored afterwards.
    ///
    /// Per-step observer notifications are suppressed; one terminal
    /// `(start_pc, final_pc)` notification fires at the end, timeout
    /// included, so downstream consumers land on the right row.
    pub fn run_until_pc(&mut self, target: u64, max_steps: u64) -> SimResult<RunOutcome> {
        self.ensure_loaded()?;
        let start_pc = self.cpu.pc;
        self.phase = SimPhase::Running;
        self.cpu.running = true;
        let previous_breakpoint = self.cpu.breakpoint.replace(target);

        let mut steps = 0u64;
        let mut halted = false;
        let result = loop {
            if self.cpu.pc == target {
                break Ok(());
            }
            if steps >= max_steps {
                break Err(SimError::RunTimeout { target, steps });
            }
            match self.step_bulk(CoreRequest::StepInstruction) {
                Ok(BulkStep::Stepped) => steps += 1,
                Ok(BulkStep::Halted) => {
                    halted = true;
                    steps += 1;
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        self.phase = if halted { SimPhase::Halted } else { SimPhase::Loaded };
        self.cpu.running = false;
        self.cpu.breakpoint = previous_breakpoint;
        // A loop failure wins over a refresh failure; refresh is
        // best-effort on the error path.
        let refreshed = self.refresh_memory();
        if self.cpu.pc != start_pc {
            self.notify(start_pc, self.cpu.pc);
        }
        result?;
        refreshed?;
        Ok(RunOutcome { steps, start_pc, final_pc: self.cpu.pc, halted })
    }

    /// `Loaded -> Running -> Halted`: step by instruction until the core
    /// reports a halt condition or the program counter reaches the
    /// breakpoint installed via [`set_breakpoint`](Self::set_breakpoint),
    /// or `Loaded` if `stop` is raised first (cancellation always lands on
    /// a post-instruction boundary).
    ///
    /// A run starting on the breakpoint address steps off it first, so a
    /// halted session can be resumed without clearing the breakpoint.
    pub fn run_until_break(&mut self, stop: &AtomicBool) -> SimResult<RunOutcome> {
        self.ensure_loaded()?;
        let start_pc = self.cpu.pc;
        self.phase = SimPhase::Running;
        self.cpu.running = true;

        let mut steps = 0u64;
        let mut halted = false;
        let result = loop {
            if stop.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.step_bulk(CoreRequest::StepInstruction) {
                Ok(BulkStep::Stepped) => {
                    steps += 1;
                    if self.cpu.breakpoint == Some(self.cpu.pc) {
                        halted = true;
                        break Ok(());
                    }
                }
                Ok(BulkStep::Halted) => {
                    halted = true;
                    steps += 1;
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };

        self.phase = if halted { SimPhase::Halted } else { SimPhase::Loaded };
        self.cpu.running = false;
        // A loop failure wins over a refresh failure; refresh is
        // best-effort on the error path.
        let refreshed = self.refresh_memory();
        if self.cpu.pc != start_pc {
            self.notify(start_pc, self.cpu.pc);
        }
        result?;
        refreshed?;
        Ok(RunOutcome { steps, start_pc, final_pc: self.cpu.pc, halted })
    }

    fn ensure_loaded(&self) -> SimResult<()> {
        if self.phase == SimPhase::Idle {
            return Err(SimError::NotLoaded);
        }
        Ok(())
    }

    /// One observed step: updates CPU state, reports the pc transition.
    /// A halt response still updates the pc and parks the phase in
    /// `Halted`; the caller decides whether to notify.
    fn step_once(&mut self, request: CoreRequest) -> SimResult<PcChange> {
        let old_pc = self.cpu.pc;
        match self.core.request(request) {
            CoreResponse::Stepped { pc, registers } => {
                self.cpu.pc = pc;
                self.cpu.registers = registers;
                if self.phase == SimPhase::Halted {
                    self.phase = SimPhase::Loaded;
                }
                Ok(PcChange { old_pc, new_pc: pc })
            }
            CoreResponse::Halted { pc } => {
                self.cpu.pc = pc;
                self.phase = SimPhase::Halted;
                Ok(PcChange { old_pc, new_pc: pc })
            }
            CoreResponse::Error(reason) => Err(SimError::Step(reason)),
            other => Err(SimError::Protocol(format!("{other:?} in response to a step"))),
        }
    }

    /// One silent step inside a bulk run (no observer, no memory refresh).
    fn step_bulk(&mut self, request: CoreRequest) -> SimResult<BulkStep> {
        match self.core.request(request) {
            CoreResponse::Stepped { pc, registers } => {
                self.cpu.pc = pc;
                self.cpu.registers = registers;
                Ok(BulkStep::Stepped)
            }
            CoreResponse::Halted { pc } => {
                self.cpu.pc = pc;
                Ok(BulkStep::Halted)
            }
            CoreResponse::Error(reason) => Err(SimError::Step(reason)),
            other => Err(SimError::Protocol(format!("{other:?} in response to a step"))),
        }
    }

    /// Pull the full memory image from the core into CpuState.
    fn refresh_memory(&mut self) -> SimResult<()> {
        match self.core.request(CoreRequest::ReadMemory { start: 0, len: usize::MAX }) {
            CoreResponse::MemorySnapshot(bytes) => {
                self.cpu.memory = bytes;
                Ok(())
            }
            CoreResponse::Error(reason) => Err(SimError::Step(reason)),
            other => Err(SimError::Protocol(format!("{other:?} in response to ReadMemory"))),
        }
    }

    fn notify(&mut self, old_pc: u64, new_pc: u64) {
        if let Some(observer) = self.observer.as_mut() {
            observer.pc_changed(old_pc, new_pc);
        }
    }
}

enum BulkStep {
    Stepped,
    Halted,
}
