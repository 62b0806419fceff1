//! Reload generation counter

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One reload cycle's injection number.
///
/// Generations increase monotonically for the life of the process and name
/// the build artifacts (`reload{N}.o`, `reload{N}.so`, `reload{N}.log`), so
/// successive reloads of the same unit can never collide on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn object_name(&self) -> String {
        format!("reload{}.o", self.0)
    }

    pub fn module_name(&self) -> String {
        format!("reload{}.so", self.0)
    }

    pub fn log_name(&self) -> String {
        format!("reload{}.log", self.0)
    }

    pub fn artifact_in(&self, dir: &std::path::Path, name: fn(&Self) -> String) -> PathBuf {
        dir.join(name(self))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared monotone counter handing out generations.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    next: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Resume counting above generations left by a previous run.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(first)),
        }
    }

    pub fn bump(&self) -> Generation {
        Generation(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Ensure future generations come out strictly above `seen`. Used
    /// when artifacts from a previous run are replayed at startup.
    pub fn advance_past(&self, seen: Generation) {
        self.next.fetch_max(seen.0 + 1, Ordering::SeqCst);
    }

    pub fn current(&self) -> Generation {
        Generation(self.next.load(Ordering::SeqCst).saturating_sub(1))
    }
}
