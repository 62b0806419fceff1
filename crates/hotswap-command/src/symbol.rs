//! Symbols and addresses
//!
//! All raw addresses in the pipeline travel inside [`Addr`]; only the
//! patch engine's slot capability ever dereferences one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An address inside the target process. Opaque everywhere except the
/// patch engine's slot accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Addr(pub usize);

impl Addr {
    pub const NULL: Addr = Addr(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// What a harvested symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// A callable function definition.
    Function,
    /// A type descriptor; `dispatch` is true for reference types whose
    /// instances are dispatched through a table of function pointers,
    /// false for plain value types.
    Type { dispatch: bool },
    /// A global variable accessor.
    Global,
}

/// One symbol a loaded module defines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Linker-level name.
    pub mangled: String,
    /// Human-readable name.
    pub demangled: String,
    pub kind: SymbolKind,
    pub address: Addr,
    /// Declared storage size, when the symbol lister reports one.
    /// Meaningful for type descriptors, where it backs the layout-change
    /// heuristic.
    pub size: Option<u64>,
}

impl SymbolRecord {
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    pub fn is_dispatch_type(&self) -> bool {
        matches!(self.kind, SymbolKind::Type { dispatch: true })
    }
}

/// One named dispatch slot: the symbol a slot resolves and the address of
/// the slot itself (not of the implementation it currently holds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub symbol: String,
    pub slot: Addr,
}
