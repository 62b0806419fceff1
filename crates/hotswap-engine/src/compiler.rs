//! The Send half of the pipeline: resolve + build

use crate::Result;
use hotswap_builder::{BuiltModule, ModuleBuilder};
use hotswap_command::GenerationCounter;
use hotswap_resolver::{CommandResolver, Origin};
use std::path::Path;
use tracing::{info, warn};

/// Resolves and builds changed files. Owns no process state, so it can
/// live on the compile worker thread while the engine stays with the
/// application.
pub struct Compiler {
    resolver: CommandResolver,
    builder: ModuleBuilder,
    counter: GenerationCounter,
}

impl Compiler {
    pub fn new(
        resolver: CommandResolver,
        builder: ModuleBuilder,
        counter: GenerationCounter,
    ) -> Self {
        Self {
            resolver,
            builder,
            counter,
        }
    }

    pub fn resolver(&self) -> &CommandResolver {
        &self.resolver
    }

    pub fn counter(&self) -> &GenerationCounter {
        &self.counter
    }

    /// Where build artifacts land; the replay scan reads this directory.
    pub fn tmp_dir(&self) -> &Path {
        self.builder.tmp_dir()
    }

    /// Resolve `path` and build it into the next generation's module.
    ///
    /// A build failure under a cached command usually means the cached
    /// flags went stale while the fingerprint stayed put (a header moved,
    /// a define changed in a file the fingerprint does not cover). In
    /// that one case the cache entry is evicted and the file re-resolved
    /// and rebuilt once from the external source.
    pub fn compile(&self, path: &Path) -> Result<BuiltModule> {
        self.compile_with_hint(path, None)
    }

    /// Compile with the originating-IDE hint from the change batch
    /// carried into resolution.
    pub fn compile_with_hint(&self, path: &Path, hint: Option<&Path>) -> Result<BuiltModule> {
        let resolution = self.resolver.resolve_with_hint(path, hint)?;
        let generation = self.counter.bump();
        info!(%generation, path = %path.display(), "compile started");

        match self.builder.build(&resolution.command, path, generation) {
            Ok(built) => Ok(built),
            Err(err) if resolution.origin == Origin::CacheHit => {
                warn!(
                    path = %path.display(),
                    %err,
                    "build failed under cached command, re-resolving once"
                );
                self.resolver.evict(path)?;
                let fresh = self.resolver.resolve_with_hint(path, hint)?;
                let retry_generation = self.counter.bump();
                Ok(self.builder.build(&fresh.command, path, retry_generation)?)
            }
            Err(err) => Err(err.into()),
        }
    }
}
