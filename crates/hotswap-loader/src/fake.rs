//! Scripted host for tests
//!
//! Simulates a process and its loadable modules entirely in memory, so
//! the resolve → build → load → patch pipeline can be exercised without
//! compiling native code. Addresses are arbitrary tokens; nothing is
//! ever dereferenced.

use crate::{ImageHost, ImageId, LoadError, RawSymbol, Result};
use hotswap_command::Addr;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct FakeImageHost {
    base: HashMap<String, Addr>,
    base_sizes: HashMap<String, u64>,
    registered: HashMap<PathBuf, Vec<RawSymbol>>,
    opened: Vec<PathBuf>,
    /// Paths whose open should fail, with the failure text.
    poisoned: HashMap<PathBuf, String>,
}

impl FakeImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a symbol the "process" already exports.
    pub fn define_base_symbol(&mut self, name: impl Into<String>, addr: Addr) {
        self.base.insert(name.into(), addr);
    }

    /// Declare a base symbol with a known declared size.
    pub fn define_base_symbol_sized(&mut self, name: impl Into<String>, addr: Addr, size: u64) {
        let name = name.into();
        self.base_sizes.insert(name.clone(), size);
        self.base.insert(name, addr);
    }

    /// Register a module file the host will accept an `open` for.
    pub fn register_image(&mut self, path: impl Into<PathBuf>, symbols: Vec<RawSymbol>) {
        self.registered.insert(path.into(), symbols);
    }

    /// Make `open` of `path` fail with `detail`, as a real loader would.
    pub fn poison_image(&mut self, path: impl Into<PathBuf>, detail: impl Into<String>) {
        self.poisoned.insert(path.into(), detail.into());
    }

    pub fn opened_count(&self) -> usize {
        self.opened.len()
    }
}

impl ImageHost for FakeImageHost {
    fn open(&mut self, path: &Path) -> Result<ImageId> {
        if let Some(detail) = self.poisoned.get(path) {
            return Err(LoadError::from_open_failure(path, detail.clone()));
        }
        if !self.registered.contains_key(path) {
            return Err(LoadError::from_open_failure(
                path,
                "cannot open shared object file: No such file or directory".to_string(),
            ));
        }
        self.opened.push(path.to_path_buf());
        Ok(ImageId(self.opened.len()))
    }

    fn resolve(&self, image: ImageId, symbol: &str) -> Option<Addr> {
        if image == ImageId::BASE {
            return self.base.get(symbol).copied();
        }
        let path = self.opened.get(image.0 - 1)?;
        self.registered
            .get(path)?
            .iter()
            .find(|s| s.name == symbol)
            .map(|s| s.addr)
    }

    fn defined_symbols(&self, path: &Path) -> Result<Vec<RawSymbol>> {
        self.registered
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::UnknownImage(path.to_path_buf()))
    }

    fn base_symbol_size(&self, symbol: &str) -> Option<u64> {
        self.base_sizes.get(symbol).copied()
    }
}
