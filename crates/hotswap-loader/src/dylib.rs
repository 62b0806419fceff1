//! The real process host: platform dynamic loader plus `nm`

use crate::{ImageHost, ImageId, LoadError, RawSymbol, Result};
use hotswap_command::{run_tool, Addr, ToolInvocation};
use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Opens modules with the platform dynamic loader and reads their symbol
/// tables with `nm`. Opened libraries are held for the life of the host;
/// a superseded generation's code must stay mapped because live callers
/// may still be executing it.
pub struct DylibImageHost {
    base: Library,
    images: Vec<Library>,
    nm: PathBuf,
    nm_timeout: Duration,
}

impl DylibImageHost {
    pub fn new() -> Self {
        Self {
            base: Library::this(),
            images: Vec::new(),
            nm: PathBuf::from("nm"),
            nm_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_nm(mut self, nm: impl Into<PathBuf>) -> Self {
        self.nm = nm.into();
        self
    }

    fn library(&self, image: ImageId) -> Option<&Library> {
        if image == ImageId::BASE {
            Some(&self.base)
        } else {
            self.images.get(image.0 - 1)
        }
    }
}

impl Default for DylibImageHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageHost for DylibImageHost {
    fn open(&mut self, path: &Path) -> Result<ImageId> {
        // RTLD_NOW surfaces unresolved references immediately, at open
        // time, where they can be classified and reported; RTLD_GLOBAL
        // lets later generations bind against this one.
        let library = unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }
            .map_err(|err| LoadError::from_open_failure(path, err.to_string()))?;
        self.images.push(library);
        let id = ImageId(self.images.len());
        debug!(path = %path.display(), image = id.0, "module opened");
        Ok(id)
    }

    fn resolve(&self, image: ImageId, symbol: &str) -> Option<Addr> {
        let library = self.library(image)?;
        let mut name = symbol.as_bytes().to_vec();
        name.push(0);
        let found = unsafe { library.get::<*mut std::ffi::c_void>(&name) }.ok()?;
        let addr = (*found) as usize;
        (addr != 0).then_some(Addr(addr))
    }

    fn defined_symbols(&self, path: &Path) -> Result<Vec<RawSymbol>> {
        let log = path.with_extension("nm.log");
        let invocation = ToolInvocation::new(&self.nm)
            .arg("-S")
            .arg("--defined-only")
            .arg(path.to_string_lossy().into_owned());
        run_tool(&invocation, &log, self.nm_timeout).map_err(|source| LoadError::SymbolTable {
            path: path.to_path_buf(),
            source,
        })?;
        let listing = std::fs::read_to_string(&log)?;
        parse_nm_listing(&listing)
    }
}

/// Parse `nm -S --defined-only` output.
///
/// Lines come as `ADDR [SIZE] LETTER NAME`; both ADDR and SIZE are hex.
/// Lines without an address column (undefined entries slip through on
/// some platforms) are skipped.
pub(crate) fn parse_nm_listing(listing: &str) -> Result<Vec<RawSymbol>> {
    let mut symbols = Vec::new();
    for line in listing.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (addr, size, kind, name) = match fields.as_slice() {
            [addr, size, kind, name] if kind.len() == 1 => {
                let size = u64::from_str_radix(size, 16)
                    .map_err(|_| LoadError::MalformedSymbolLine(line.to_string()))?;
                (*addr, Some(size), *kind, *name)
            }
            [addr, kind, name] if kind.len() == 1 => (*addr, None, *kind, *name),
            // two-column lines are undefined symbols; ignore
            [_, _] => continue,
            _ => return Err(LoadError::MalformedSymbolLine(line.to_string())),
        };
        let addr = usize::from_str_radix(addr, 16)
            .map_err(|_| LoadError::MalformedSymbolLine(line.to_string()))?;
        let kind = kind.chars().next().unwrap_or('?');
        let mut symbol = RawSymbol::new(name, Addr(addr), kind);
        symbol.size = size;
        symbols.push(symbol);
    }
    Ok(symbols)
}
