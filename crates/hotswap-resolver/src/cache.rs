//! Cache storage abstraction for resolved compile commands

use crate::Result;
use hotswap_command::{CompilationCommand, Fingerprint, SourceUnit};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// One cached resolution: the command, the per-file freshness record,
/// and the workspace fingerprint the command was recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub command: CompilationCommand,
    pub unit: SourceUnit,
    pub fingerprint: Fingerprint,
    /// Seconds since the epoch when the entry was stored.
    pub cached_at: u64,
}

impl CacheEntry {
    pub fn new(command: CompilationCommand, unit: SourceUnit, fingerprint: Fingerprint) -> Self {
        let cached_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            command,
            unit,
            fingerprint,
            cached_at,
        }
    }

    /// An entry is only trustworthy under the fingerprint it was stored
    /// with; anything else means the workspace or toolchain moved.
    pub fn matches_fingerprint(&self, current: &Fingerprint) -> bool {
        &self.fingerprint == current
    }
}

/// Pluggable cache backend keyed by source path.
///
/// Implementations must tolerate concurrent use from the watcher thread
/// and the engine thread.
pub trait CacheStore: Send + Sync {
    fn get(&self, path: &Path) -> Result<Option<CacheEntry>>;

    fn put(&self, path: &Path, entry: CacheEntry) -> Result<()>;

    fn remove(&self, path: &Path) -> Result<()>;

    /// Drop every entry. Used when the workspace fingerprint changes
    /// wholesale or the user asks for a clean slate.
    fn clear(&self) -> Result<()>;

    /// Number of cached commands.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All cached paths, for diagnostics.
    fn paths(&self) -> Result<Vec<std::path::PathBuf>>;
}
