//! Hotswap module building
//!
//! Takes the compile command the resolver recovered and turns one changed
//! source file into a freshly linked dynamic module: rewrite the command
//! for a single-file compile, run the compiler, link the object into a
//! `.so` with unresolved symbols allowed, and hand the result to an
//! optional signer. Every generation gets its own object, module, and
//! build log under the builder's temp directory.

mod builder;
mod error;
mod shim;
mod signer;

pub use builder::{BuildConfig, BuiltModule, ModuleBuilder};
pub use error::{BuildError, Result};
pub use shim::SourceShim;
pub use signer::{NoopSigner, Signer, ToolSigner};
