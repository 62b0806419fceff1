//! Temporary source rewriting with guaranteed restore
//!
//! Some rebuilds need the source text adjusted before the compiler sees
//! it (renaming a type so the new definition can coexist with the loaded
//! one, injecting an entry-point marker). The shim applies the edit,
//! keeps a backup next to the file for crash recovery, and restores the
//! original bytes unconditionally when dropped — on success, on build
//! failure, and on panic alike.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct SourceShim {
    path: PathBuf,
    backup: PathBuf,
    original: Vec<u8>,
}

impl SourceShim {
    /// Rewrite `path` with `transform` applied to its current text.
    /// The original content is restored when the shim is dropped.
    pub fn apply<F>(path: &Path, transform: F) -> io::Result<Self>
    where
        F: FnOnce(&str) -> String,
    {
        let original = fs::read(path)?;
        let text = String::from_utf8_lossy(&original).into_owned();

        let backup = backup_path(path);
        fs::write(&backup, &original)?;
        fs::write(path, transform(&text))?;

        Ok(Self {
            path: path.to_path_buf(),
            backup,
            original,
        })
    }

    /// Pick up after a crash: if a backup from an interrupted shim still
    /// sits next to `path`, restore it. Returns whether a restore ran.
    pub fn recover(path: &Path) -> io::Result<bool> {
        let backup = backup_path(path);
        if !backup.exists() {
            return Ok(false);
        }
        fs::rename(&backup, path)?;
        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SourceShim {
    fn drop(&mut self) {
        if let Err(err) = fs::write(&self.path, &self.original) {
            warn!(path = %self.path.display(), %err, "could not restore shimmed source");
            return;
        }
        let _ = fs::remove_file(&self.backup);
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".orig");
    path.with_file_name(name)
}
