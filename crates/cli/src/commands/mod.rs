pub mod disasm;
pub mod memdump;
pub mod sim;
pub mod util;

pub use disasm::*;
pub use memdump::*;
pub use sim::*;
pub use util::*;
