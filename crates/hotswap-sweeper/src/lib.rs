//! Hotswap live-object sweep
//!
//! After the patch engine rewrites dispatch tables, instances created
//! before the reload may still need per-instance attention: a reload
//! notification hook, or a per-instance dispatch fixup for types whose
//! shared tables could not be rewritten. The sweep walks the
//! application's registered root objects, visits every reachable object
//! exactly once (object graphs have cycles), and applies both.
//!
//! The sweep is deliberately not `Send`: roots are reference-counted
//! application objects owned by the thread that runs the engine.

mod reflect;
mod sweep;

pub use reflect::{Obj, Reflectable, ValueKind};
pub use sweep::{SweepReport, SweepTargets, Sweeper};
