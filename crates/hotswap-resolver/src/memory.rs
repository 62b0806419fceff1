//! In-memory cache backend
//!
//! Fast path for commands already resolved in this session, and the
//! backend of choice in tests. No persistence; contents vanish with the
//! process.

use crate::{CacheEntry, CacheStore, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Default)]
pub struct InMemoryCommandCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

impl InMemoryCommandCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for InMemoryCommandCache {
    fn get(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(path).cloned())
    }

    fn put(&self, path: &Path, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(path.to_path_buf(), entry);
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(path);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.len())
    }

    fn paths(&self) -> Result<Vec<PathBuf>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<PathBuf> = entries.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_command::{CompilationCommand, Fingerprint, SourceUnit};

    fn entry_for(path: &Path) -> CacheEntry {
        let command = CompilationCommand::new("/usr/bin/cc", vec!["-c".into()]);
        let unit = SourceUnit {
            path: path.to_path_buf(),
            flags_hash: 1,
            mtime: 2,
        };
        CacheEntry::new(command, unit, Fingerprint::from_token("fp-test"))
    }

    #[test]
    fn test_put_get_remove() {
        let cache = InMemoryCommandCache::new();
        let path = Path::new("/src/a.c");
        assert!(cache.get(path).unwrap().is_none());

        cache.put(path, entry_for(path)).unwrap();
        assert!(cache.get(path).unwrap().is_some());
        assert_eq!(cache.len().unwrap(), 1);

        cache.remove(path).unwrap();
        assert!(cache.get(path).unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_clear_drops_everything() {
        let cache = InMemoryCommandCache::new();
        for name in ["/src/a.c", "/src/b.c", "/src/c.c"] {
            let path = Path::new(name);
            cache.put(path, entry_for(path)).unwrap();
        }
        assert_eq!(cache.len().unwrap(), 3);
        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_paths_are_sorted() {
        let cache = InMemoryCommandCache::new();
        for name in ["/src/c.c", "/src/a.c", "/src/b.c"] {
            let path = Path::new(name);
            cache.put(path, entry_for(path)).unwrap();
        }
        let paths = cache.paths().unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/src/a.c"),
                PathBuf::from("/src/b.c"),
                PathBuf::from("/src/c.c"),
            ]
        );
    }
}
