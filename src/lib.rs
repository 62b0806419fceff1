//! hotswap - incremental hot reloading for running processes
//!
//! This is the root workspace crate that provides integration tests.
//! The actual implementation is in the workspace member crates.

// Re-export main crates for convenience
pub use hotswap_builder as builder;
pub use hotswap_command as command;
pub use hotswap_engine as engine;
pub use hotswap_loader as loader;
pub use hotswap_patcher as patcher;
pub use hotswap_resolver as resolver;
pub use hotswap_sweeper as sweeper;
