//! Source units tracked across reloads

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::CompilationCommand;

/// One source file the engine knows how to rebuild.
///
/// Identity is the absolute path. The fingerprint fields record the flags
/// hash and modification time observed at the last successful resolve;
/// units are never deleted, only updated, and persist across restarts
/// alongside their cached command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: PathBuf,
    /// Hash of the compiler flags last used for this unit.
    pub flags_hash: u64,
    /// Modification time at the last successful resolve, seconds since epoch.
    pub mtime: u64,
}

impl SourceUnit {
    /// Record a unit from the command just resolved for it.
    pub fn observed(path: impl Into<PathBuf>, command: &CompilationCommand) -> Self {
        let path = path.into();
        let mtime = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(|t| {
                t.duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        Self {
            path,
            flags_hash: hash_flags(command),
            mtime,
        }
    }

    /// Whether `command` carries the same flags this unit last built with.
    pub fn matches(&self, command: &CompilationCommand) -> bool {
        self.flags_hash == hash_flags(command)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn hash_flags(command: &CompilationCommand) -> u64 {
    let mut hasher = DefaultHasher::new();
    command.program.hash(&mut hasher);
    command.args.hash(&mut hasher);
    command.env.hash(&mut hasher);
    hasher.finish()
}
