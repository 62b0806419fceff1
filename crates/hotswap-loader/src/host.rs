//! The process-image abstraction

use crate::Result;
use hotswap_command::Addr;
use std::path::Path;

/// Identifies one opened image within a host. `BASE` is the running
/// process itself, available without an explicit `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

impl ImageId {
    pub const BASE: ImageId = ImageId(0);
}

/// One entry of an image's defined-symbol table, before classification.
///
/// `kind` is the single-letter symbol type as the platform's `nm` prints
/// it; `size` is the defined size when the table records one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    pub name: String,
    pub addr: Addr,
    pub kind: char,
    pub size: Option<u64>,
}

impl RawSymbol {
    pub fn new(name: impl Into<String>, addr: Addr, kind: char) -> Self {
        Self {
            name: name.into(),
            addr,
            kind,
            size: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// What the loader needs from the process: open an image, resolve a
/// symbol in an image, and enumerate an image file's defined symbols.
///
/// The real implementation wraps the platform dynamic loader and `nm`;
/// tests substitute a scripted host so the whole reload pipeline runs
/// without producing native binaries.
pub trait ImageHost: Send {
    /// Load the image at `path` into the process. Images are never
    /// unloaded; old generations stay mapped for the process lifetime.
    fn open(&mut self, path: &Path) -> Result<ImageId>;

    /// Address of `symbol` within `image`, or `None` if undefined there.
    fn resolve(&self, image: ImageId, symbol: &str) -> Option<Addr>;

    /// The defined symbols of the image file at `path`, read from its
    /// on-disk symbol table.
    fn defined_symbols(&self, path: &Path) -> Result<Vec<RawSymbol>>;

    /// Declared size of a symbol already defined in the base process,
    /// when the host can know it. Backs the layout-change heuristic for
    /// replaced type descriptors.
    fn base_symbol_size(&self, _symbol: &str) -> Option<u64> {
        None
    }
}
