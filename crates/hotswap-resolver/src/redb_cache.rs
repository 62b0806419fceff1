//! redb-based persistent command cache
//!
//! Survives process restarts so a relaunched session can reload a file
//! without re-scraping build logs. All entries live in a single `.redb`
//! file with automatic crash recovery.

use crate::{CacheEntry, CacheStore, Result};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};

const COMMANDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("commands");

pub struct RedbCommandCache {
    db: Database,
    path: PathBuf,
}

impl RedbCommandCache {
    /// Create or open a command cache at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(COMMANDS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db, path })
    }

    /// Get the file path of this cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_for(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }
}

impl CacheStore for RedbCommandCache {
    fn get(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;
        let key = Self::key_for(path);
        match table.get(key.as_str())? {
            Some(bytes) => {
                let entry: CacheEntry = bincode::deserialize(bytes.value())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn put(&self, path: &Path, entry: CacheEntry) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMANDS_TABLE)?;
            let key = Self::key_for(path);
            let bytes = bincode::serialize(&entry)?;
            table.insert(key.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMANDS_TABLE)?;
            let key = Self::key_for(path);
            table.remove(key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMANDS_TABLE)?;
            // redb has no truncate; drain keys explicitly
            let keys: Vec<String> = table
                .iter()?
                .filter_map(|r| r.ok())
                .map(|(k, _)| k.value().to_string())
                .collect();
            for key in keys {
                table.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;
        Ok(table.len()? as usize)
    }

    fn paths(&self) -> Result<Vec<PathBuf>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;
        let mut paths: Vec<PathBuf> = table
            .iter()?
            .filter_map(|r| r.ok())
            .map(|(k, _)| PathBuf::from(k.value()))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotswap_command::{CompilationCommand, Fingerprint, SourceUnit};
    use tempfile::tempdir;

    fn entry_for(path: &Path) -> CacheEntry {
        let command = CompilationCommand::new(
            "/usr/bin/cc",
            vec!["-c".into(), path.to_string_lossy().into_owned()],
        );
        let unit = SourceUnit {
            path: path.to_path_buf(),
            flags_hash: 7,
            mtime: 11,
        };
        CacheEntry::new(command, unit, Fingerprint::from_token("fp-redb"))
    }

    #[test]
    fn test_roundtrip_through_disk() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("commands.redb");
        let path = Path::new("/src/widget.c");

        {
            let cache = RedbCommandCache::new(&db_path).unwrap();
            cache.put(path, entry_for(path)).unwrap();
        }

        // Reopen to prove persistence.
        let cache = RedbCommandCache::new(&db_path).unwrap();
        let loaded = cache.get(path).unwrap().unwrap();
        assert_eq!(loaded.unit.path, path);
        assert_eq!(loaded.fingerprint.as_str(), "fp-redb");
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let cache = RedbCommandCache::new(dir.path().join("commands.redb")).unwrap();

        let a = Path::new("/src/a.c");
        let b = Path::new("/src/b.c");
        cache.put(a, entry_for(a)).unwrap();
        cache.put(b, entry_for(b)).unwrap();

        cache.remove(a).unwrap();
        assert!(cache.get(a).unwrap().is_none());
        assert!(cache.get(b).unwrap().is_some());

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_paths_listing() {
        let dir = tempdir().unwrap();
        let cache = RedbCommandCache::new(dir.path().join("commands.redb")).unwrap();
        for name in ["/src/z.c", "/src/a.c"] {
            let path = Path::new(name);
            cache.put(path, entry_for(path)).unwrap();
        }
        assert_eq!(
            cache.paths().unwrap(),
            vec![PathBuf::from("/src/a.c"), PathBuf::from("/src/z.c")]
        );
    }
}
