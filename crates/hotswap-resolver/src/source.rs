//! The pluggable external lookup strategy

use crate::Result;
use hotswap_command::CompilationCommand;
use std::path::Path;

/// Where compile commands come from when the cache has nothing.
///
/// The resolver treats this as an opaque strategy: the log-scraping
/// implementation and the action-graph implementation are interchangeable
/// behind it. `Ok(None)` means the source was consulted and genuinely has
/// no record for the path; errors mean the source itself failed.
pub trait CommandSource: Send {
    fn lookup(&self, path: &Path) -> Result<Option<CompilationCommand>>;

    /// Lookup carrying the originating-IDE hint from the change batch.
    /// Sources that cannot make use of the hint fall back to the plain
    /// lookup.
    fn lookup_with_hint(
        &self,
        path: &Path,
        _hint: Option<&Path>,
    ) -> Result<Option<CompilationCommand>> {
        self.lookup(path)
    }

    /// Short name for log lines.
    fn name(&self) -> &str;
}
