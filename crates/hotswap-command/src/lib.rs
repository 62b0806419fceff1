//! Hotswap core data model
//!
//! Shared vocabulary for the reload pipeline: the compilation command a
//! full build used for a source unit, the source unit itself, the
//! workspace/toolchain fingerprint that decides whether cached commands
//! are still trustworthy, the generation counter that names reload
//! artifacts, and the change batches delivered by the file notifier.
//!
//! Every other crate in the workspace depends on this one; it depends on
//! nothing but serde and sha2.

mod change;
mod command;
mod fingerprint;
mod generation;
mod shellwords;
mod symbol;
mod tool;
mod unit;

pub use change::{ChangeBatch, ChangeKind, SourceChange};
pub use command::CompilationCommand;
pub use fingerprint::Fingerprint;
pub use generation::{Generation, GenerationCounter};
pub use shellwords::{join_words, split_words};
pub use symbol::{Addr, SlotRef, SymbolKind, SymbolRecord};
pub use tool::{run_tool, ToolError, ToolInvocation};
pub use unit::SourceUnit;
