//! Background disassembly with a single-flight guard per binary path.
//!
//! The pipeline runs dump + parse on a worker thread and hands the result
//! back over an `mpsc` channel, so the interactive thread keeps working
//! while a big binary churns. At most one run per binary path is in
//! flight: a duplicate request is rejected immediately instead of being
//! queued, which prevents duplicate CPU-bound parses and races over which
//! result wins. The in-flight marker clears unconditionally when the
//! worker finishes, fails, or panics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::disasm::{check_binary_path, parse_dump, DisasmError, DisasmRequest, DisasmResult,
    DisasmTool};
use crate::model::BinaryImage;

/// Successful result of one pipeline run.
#[derive(Debug)]
pub struct DisasmOutcome {
    /// The freshly parsed image, published atomically as one value.
    pub image: BinaryImage,
    /// Exit code of the external disassembler; informational only.
    pub exit_code: Option<i32>,
}

/// Coordinates background disassembly runs.
#[derive(Debug, Default)]
pub struct DisasmPipeline {
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
}

impl DisasmPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a run for `path` has started and not yet completed.
    pub fn is_in_flight(&self, path: &Path) -> bool {
        self.in_flight.lock().expect("in-flight set poisoned").contains(path)
    }

    /// Start a background disassembly of `request.binary_path`.
    ///
    /// Returns the receiving end of a channel that delivers exactly one
    /// `Result`. Fails fast (without spawning) when the path is missing,
    /// has an unrecognized extension, or is already being disassembled.
    ///
    /// A failed run delivers its error over the channel and leaves any
    /// previously published image with the caller untouched.
    pub fn disassemble(
        &self,
        request: DisasmRequest,
        tool: Arc<dyn DisasmTool>,
    ) -> DisasmResult<Receiver<DisasmResult<DisasmOutcome>>> {
        check_binary_path(&request.binary_path)?;

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !in_flight.insert(request.binary_path.clone()) {
                return Err(DisasmError::AlreadyInFlight(request.binary_path));
            }
        }

        let (tx, rx) = mpsc::channel();
        let clear = InFlightClear {
            set: Arc::clone(&self.in_flight),
            path: request.binary_path.clone(),
        };
        thread::spawn(move || {
            // Moved into the worker so the marker clears on any exit path.
            let _clear = clear;
            let result = tool.dump(&request).and_then(|output| {
                let image = parse_dump(&output.text)?;
                Ok(DisasmOutcome { image, exit_code: output.exit_code })
            });
            // The caller may have dropped the receiver; that is their call.
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    /// Convenience for callers without their own event loop: start a run
    /// and block until it delivers.
    pub fn disassemble_blocking(
        &self,
        request: DisasmRequest,
        tool: Arc<dyn DisasmTool>,
    ) -> DisasmResult<DisasmOutcome> {
        let rx = self.disassemble(request, tool)?;
        rx.recv()
            .map_err(|e| DisasmError::Spawn(format!("disassembly worker vanished: {e}")))?
    }
}

/// Clears the in-flight marker for one path when dropped.
struct InFlightClear {
    set: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for InFlightClear {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.path);
        }
    }
}
