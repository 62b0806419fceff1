//! Symbol classification and harvesting

use crate::{ImageHost, ImageId, RawSymbol, Result};
use hotswap_command::{Addr, SymbolKind, SymbolRecord};
use std::path::Path;
use tracing::debug;

/// Suffix that marks a symbol as a type descriptor in the symbol table.
const TYPE_SUFFIX: &str = ".type";

/// Map a raw symbol-table entry to the pipeline's symbol kinds.
///
/// Text-section entries are functions. Type descriptors carry the
/// `.type` suffix; a descriptor in a writable data section has a live
/// dispatch table that can be rewritten in place, one in a read-only
/// section does not and must be handled by the object sweep instead.
/// Remaining data entries are globals. Anything else (debug symbols,
/// section markers) is skipped.
pub fn classify_symbol(raw: &RawSymbol) -> Option<SymbolKind> {
    let is_type = raw.name.ends_with(TYPE_SUFFIX);
    match raw.kind {
        'T' | 't' => Some(SymbolKind::Function),
        'D' | 'd' if is_type => Some(SymbolKind::Type { dispatch: true }),
        'R' | 'r' | 'S' | 's' if is_type => Some(SymbolKind::Type { dispatch: false }),
        'D' | 'd' | 'B' | 'b' | 'G' | 'g' | 'R' | 'r' | 'S' | 's' => Some(SymbolKind::Global),
        _ => None,
    }
}

fn demangle(mangled: &str) -> String {
    let name = mangled.strip_prefix('_').unwrap_or(mangled);
    name.strip_suffix(TYPE_SUFFIX).unwrap_or(name).to_string()
}

/// Read and classify the defined symbols of a freshly opened module.
///
/// Runtime addresses come from the host's resolver; the on-disk table
/// supplies kinds and sizes. Symbols the host cannot resolve (local
/// definitions dlsym will not surface) keep their table address.
pub fn harvest_module<H: ImageHost + ?Sized>(
    host: &H,
    image: ImageId,
    path: &Path,
) -> Result<Vec<SymbolRecord>> {
    let raw = host.defined_symbols(path)?;
    let mut records = Vec::with_capacity(raw.len());
    for symbol in raw {
        let Some(kind) = classify_symbol(&symbol) else {
            continue;
        };
        let address = host.resolve(image, &symbol.name).unwrap_or(symbol.addr);
        records.push(SymbolRecord {
            demangled: demangle(&symbol.name),
            mangled: symbol.name,
            kind,
            address,
            size: symbol.size,
        });
    }
    debug!(path = %path.display(), count = records.len(), "symbols harvested");
    Ok(records)
}

/// One definition the new module supersedes: the name, the address the
/// process has been using, and the address that should replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedEntity {
    pub mangled: String,
    pub kind: SymbolKind,
    pub old: Addr,
    pub new: Addr,
    /// Declared size of the old definition, when known. A differing new
    /// size on a dispatch type signals a layout change.
    pub old_size: Option<u64>,
    pub new_size: Option<u64>,
}
