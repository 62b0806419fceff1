//! Hotswap patch engine
//!
//! Points the running process at freshly loaded code: dispatch tables of
//! replaced reference types get their slots rewritten in place, and
//! registered call sites (indirection slots such as GOT entries) are
//! redirected to the newest implementation of each replaced function.
//! Redirections are cumulative across generations and replayed onto each
//! newly loaded module, so generation N+1 calls into N's replacements
//! rather than the original build.

mod engine;
mod error;
mod slots;
mod table;

pub use engine::{PatchEngine, PatchRecord, PatchReport};
pub use error::{PatchError, Result};
pub use slots::{MemorySlots, ProcessSlots, SlotAccess};
pub use table::DispatchTable;
