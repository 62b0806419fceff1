//! Loaded modules and the loader front door

use crate::{harvest_module, ImageHost, ImageId, ReplacedEntity, Result};
use hotswap_command::{Generation, SymbolRecord};
use std::path::{Path, PathBuf};
use tracing::info;

/// One generation's module after loading and harvesting.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub generation: Generation,
    pub path: PathBuf,
    pub image: ImageId,
    /// Everything the module defines, classified.
    pub symbols: Vec<SymbolRecord>,
    /// The subset that supersedes a definition the process already had.
    pub replaced: Vec<ReplacedEntity>,
}

impl LoadedModule {
    pub fn replaced_functions(&self) -> impl Iterator<Item = &ReplacedEntity> {
        self.replaced.iter().filter(|e| e.kind == hotswap_command::SymbolKind::Function)
    }

    pub fn dispatch_types(&self) -> impl Iterator<Item = &SymbolRecord> {
        self.symbols.iter().filter(|s| s.is_dispatch_type())
    }
}

/// Opens built modules and pairs their definitions against the process.
pub struct ModuleLoader<H: ImageHost> {
    host: H,
}

impl<H: ImageHost> ModuleLoader<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Load the module at `path`, harvest its symbols, and record which
    /// process definitions it replaces.
    pub fn load(&mut self, path: &Path, generation: Generation) -> Result<LoadedModule> {
        let image = self.host.open(path)?;
        let symbols = harvest_module(&self.host, image, path)?;

        let mut replaced = Vec::new();
        for record in &symbols {
            let Some(old) = self.host.resolve(ImageId::BASE, &record.mangled) else {
                continue;
            };
            if old.is_null() || old == record.address {
                continue;
            }
            replaced.push(ReplacedEntity {
                mangled: record.mangled.clone(),
                kind: record.kind,
                old,
                new: record.address,
                old_size: self.host.base_symbol_size(&record.mangled),
                new_size: record.size,
            });
        }

        info!(
            %generation,
            path = %path.display(),
            symbols = symbols.len(),
            replaced = replaced.len(),
            "module loaded"
        );
        Ok(LoadedModule {
            generation,
            path: path.to_path_buf(),
            image,
            symbols,
            replaced,
        })
    }
}
