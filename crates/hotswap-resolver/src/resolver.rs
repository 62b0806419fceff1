//! The resolver proper: memory cache, disk cache, external lookup

use crate::{CacheEntry, CacheStore, CommandSource, InMemoryCommandCache, ResolveError, Result};
use hotswap_command::{CompilationCommand, Fingerprint, SourceUnit};
use std::path::Path;
use tracing::{debug, info, warn};

/// Where a resolved command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Served from the memory or disk cache.
    CacheHit,
    /// Recovered from the external source and freshly cached.
    External,
}

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub command: CompilationCommand,
    pub origin: Origin,
}

/// Resolves a changed source path to the compile command its project
/// last built it with.
///
/// Lookup order is memory cache, then disk cache, then the external
/// source. Cache entries carry the workspace fingerprint they were
/// recorded under; a mismatched entry is evicted and the external source
/// consulted instead. Only when the external source also has nothing do
/// we surface an error, and the error distinguishes "never seen" from
/// "seen under an older workspace".
pub struct CommandResolver {
    memory: InMemoryCommandCache,
    disk: Option<Box<dyn CacheStore>>,
    source: Box<dyn CommandSource>,
    fingerprint: Fingerprint,
}

impl CommandResolver {
    pub fn new(source: Box<dyn CommandSource>, fingerprint: Fingerprint) -> Self {
        Self {
            memory: InMemoryCommandCache::new(),
            disk: None,
            source,
            fingerprint,
        }
    }

    /// Attach a persistent cache consulted after the memory cache.
    pub fn with_disk_cache(mut self, disk: Box<dyn CacheStore>) -> Self {
        self.disk = Some(disk);
        self
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Resolve the compile command for `path`.
    pub fn resolve(&self, path: &Path) -> Result<Resolution> {
        self.resolve_with_hint(path, None)
    }

    /// Resolve with the originating-IDE hint from the change batch. The
    /// hint only influences the external source; cached entries are
    /// keyed by path alone.
    pub fn resolve_with_hint(&self, path: &Path, hint: Option<&Path>) -> Result<Resolution> {
        let mut stale: Option<Fingerprint> = None;

        if let Some(entry) = self.memory.get(path)? {
            if entry.matches_fingerprint(&self.fingerprint) {
                debug!(path = %path.display(), "memory cache hit");
                return Ok(Resolution {
                    command: entry.command,
                    origin: Origin::CacheHit,
                });
            }
            stale = Some(entry.fingerprint.clone());
            self.memory.remove(path)?;
        }

        if let Some(disk) = &self.disk {
            if let Some(entry) = disk.get(path)? {
                if entry.matches_fingerprint(&self.fingerprint) {
                    debug!(path = %path.display(), "disk cache hit");
                    self.memory.put(path, entry.clone())?;
                    return Ok(Resolution {
                        command: entry.command,
                        origin: Origin::CacheHit,
                    });
                }
                warn!(
                    path = %path.display(),
                    cached = %entry.fingerprint,
                    current = %self.fingerprint,
                    "cached command is from a different workspace state, re-resolving"
                );
                stale = Some(entry.fingerprint.clone());
                disk.remove(path)?;
            }
        }

        match self.source.lookup_with_hint(path, hint)? {
            Some(command) => {
                info!(
                    path = %path.display(),
                    source = self.source.name(),
                    "compile command resolved externally"
                );
                let unit = SourceUnit::observed(path, &command);
                let entry = CacheEntry::new(command.clone(), unit, self.fingerprint.clone());
                self.memory.put(path, entry.clone())?;
                if let Some(disk) = &self.disk {
                    disk.put(path, entry)?;
                }
                Ok(Resolution {
                    command,
                    origin: Origin::External,
                })
            }
            None => match stale {
                Some(cached) => Err(ResolveError::StaleWorkspace {
                    path: path.to_path_buf(),
                    cached: cached.as_str().to_string(),
                    current: self.fingerprint.as_str().to_string(),
                }),
                None => Err(ResolveError::CommandNotFound(path.to_path_buf())),
            },
        }
    }

    /// Drop any cached command for `path`, forcing the next resolve to
    /// consult the external source. Used after a build failure that
    /// suggests the cached flags went stale.
    pub fn evict(&self, path: &Path) -> Result<()> {
        self.memory.remove(path)?;
        if let Some(disk) = &self.disk {
            disk.remove(path)?;
        }
        debug!(path = %path.display(), "cached command evicted");
        Ok(())
    }

    /// Drop every cached command.
    pub fn clear(&self) -> Result<()> {
        self.memory.clear()?;
        if let Some(disk) = &self.disk {
            disk.clear()?;
        }
        Ok(())
    }

    /// Paths with a persisted command, for diagnostics.
    pub fn cached_paths(&self) -> Result<Vec<std::path::PathBuf>> {
        match &self.disk {
            Some(disk) => disk.paths(),
            None => self.memory.paths(),
        }
    }
}
