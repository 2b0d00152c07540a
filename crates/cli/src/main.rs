use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use elfsim::commands::{self, DisasmArgs, ToolchainArgs};

/// Simulation-engine CLI for embedded binaries.
///
/// This CLI is a thin wrapper around `elfsim-core` (exposed in code as
/// `elfsim_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "elfsim",
    version,
    about = "Disassemble embedded binaries and step them in a simulated core",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Toolchain flags shared by the subcommands that invoke objdump.
#[derive(Args, Debug)]
struct ToolchainCliArgs {
    /// Directory holding the cross-toolchain binaries. Defaults to
    /// resolving `objdump` on PATH.
    #[arg(long)]
    toolchain: Option<String>,

    /// Binary-name prefix (e.g. `riscv32-unknown-elf-`).
    #[arg(long)]
    prefix: Option<String>,

    /// Flag string passed to objdump, split on whitespace.
    #[arg(long)]
    flags: Option<String>,

    /// YAML file with toolchain settings; explicit flags override it.
    #[arg(long)]
    config: Option<String>,
}

impl ToolchainCliArgs {
    fn as_args(&self) -> ToolchainArgs<'_> {
        ToolchainArgs {
            config_file: self.config.as_deref(),
            toolchain_dir: self.toolchain.as_deref(),
            prefix: self.prefix.as_deref(),
            flags: self.flags.as_deref(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Disassemble a binary and print its sections, symbols, and
    /// instructions.
    Disasm {
        /// Path to the binary to disassemble.
        #[arg(long)]
        binary: String,

        #[command(flatten)]
        toolchain: ToolchainCliArgs,

        /// SQLite file to cache parsed images in, keyed by binary path
        /// and SHA-256 hash.
        #[arg(long)]
        cache_db: Option<String>,

        /// Ignore any cached image and rerun the toolchain.
        #[arg(long, default_value_t = false)]
        reload: bool,

        /// Emit the parsed image as JSON instead of a listing.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Disassemble, load into the reference core, and run until the
    /// program counter reaches a target address.
    Run {
        /// Path to the binary to simulate.
        #[arg(long)]
        binary: String,

        /// Target program counter (`0x`-hex or decimal).
        #[arg(long)]
        until_pc: String,

        /// Iteration bound; the run fails cleanly if the target is not
        /// reached within this many instructions.
        #[arg(long, default_value_t = elfsim_core::sim::DEFAULT_MAX_RUN_STEPS)]
        max_steps: u64,

        #[command(flatten)]
        toolchain: ToolchainCliArgs,
    },

    /// Disassemble, load, and execute single steps, printing the pc
    /// trace and focus transitions.
    Step {
        /// Path to the binary to simulate.
        #[arg(long)]
        binary: String,

        /// Number of steps to execute.
        #[arg(long, default_value_t = 1)]
        count: u64,

        /// Step by clock cycle instead of by instruction.
        #[arg(long, default_value_t = false)]
        clock: bool,

        #[command(flatten)]
        toolchain: ToolchainCliArgs,
    },

    /// Format a raw file's bytes as address / byte / ASCII columns.
    Memdump {
        /// File whose bytes to format.
        #[arg(long)]
        file: String,

        /// Bytes per output line.
        #[arg(long, default_value_t = 16)]
        bytes_per_line: usize,

        /// Show bytes in decimal instead of hex.
        #[arg(long, default_value_t = false)]
        decimal: bool,

        /// Byte offset to start at.
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Disasm { binary, toolchain, cache_db, reload, json } => {
            commands::disasm_command(DisasmArgs {
                binary: &binary,
                config_file: toolchain.config.as_deref(),
                toolchain_dir: toolchain.toolchain.as_deref(),
                prefix: toolchain.prefix.as_deref(),
                flags: toolchain.flags.as_deref(),
                cache_db: cache_db.as_deref(),
                reload,
                json,
            })?
        }
        Command::Run { binary, until_pc, max_steps, toolchain } => {
            commands::run_command(&binary, &until_pc, max_steps, &toolchain.as_args())?
        }
        Command::Step { binary, count, clock, toolchain } => {
            commands::step_command(&binary, count, clock, &toolchain.as_args())?
        }
        Command::Memdump { file, bytes_per_line, decimal, start } => {
            commands::memdump_command(&file, bytes_per_line, decimal, start)?
        }
    }

    Ok(())
}
