//! Hotswap command resolution
//!
//! Given a changed source path, recover the exact compiler invocation the
//! full build used for it. Commands come from a two-level cache (memory,
//! then disk) backed by a pluggable external lookup: either scraping the
//! build's log files or querying an exported action graph. Cached entries
//! are only trusted while the workspace/toolchain fingerprint they were
//! stored under still matches.

mod actiongraph;
mod cache;
mod error;
mod logscrape;
mod memory;
mod redb_cache;
mod resolver;
mod source;

pub use actiongraph::ActionGraphQuery;
pub use cache::{CacheEntry, CacheStore};
pub use error::{ResolveError, Result};
pub use logscrape::BuildLogScraper;
pub use memory::InMemoryCommandCache;
pub use redb_cache::RedbCommandCache;
pub use resolver::{CommandResolver, Origin, Resolution};
pub use source::CommandSource;
