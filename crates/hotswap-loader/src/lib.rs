//! Hotswap module loading and symbol harvesting
//!
//! Opens freshly built dynamic modules into the running process, walks
//! their symbol tables, and pairs each replaced definition with the
//! address the process was using before the reload. The process side is
//! abstracted behind [`ImageHost`] so the pipeline can be exercised
//! end-to-end against a simulated process in tests.

mod dylib;
mod error;
mod fake;
mod harvest;
mod host;
mod module;

pub use dylib::DylibImageHost;
pub use error::{LoadError, Result};
pub use fake::FakeImageHost;
pub use harvest::{classify_symbol, harvest_module, ReplacedEntity};
pub use host::{ImageHost, ImageId, RawSymbol};
pub use module::{LoadedModule, ModuleLoader};
