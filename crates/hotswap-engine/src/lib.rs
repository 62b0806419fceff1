//! Hotswap pipeline orchestration
//!
//! Wires the subsystem crates into one reload cycle: resolve the compile
//! command, build the module, load it, patch the process, sweep the live
//! objects. The compile half is `Send` and runs on a worker thread behind
//! [`CompileQueue`]; the load/patch/sweep half touches process memory and
//! application objects and stays on the thread that owns the engine.

mod compiler;
mod engine;
mod error;
mod observer;
mod queue;

pub use compiler::Compiler;
pub use engine::{ReloadEngine, ReloadOutcome};
pub use error::{ReloadError, Result};
pub use observer::{ReloadEvent, ReloadObserver};
pub use queue::{CompileOutcome, CompileQueue, InlineHandoff, MainThreadHandoff};
