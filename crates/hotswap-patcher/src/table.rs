//! Dispatch-table descriptions

use hotswap_command::{Addr, SlotRef};

/// One reference type's table of function-pointer slots.
///
/// The patch engine compares an old table against its replacement slot
/// by slot; the descriptor records where the slots are and how large the
/// type declared itself, which backs the layout-change warning.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    /// Symbol of the owning type descriptor.
    pub type_symbol: String,
    /// Address of the table's first slot.
    pub base: Addr,
    pub slots: Vec<SlotRef>,
    pub declared_size: Option<u64>,
}

impl DispatchTable {
    pub fn new(type_symbol: impl Into<String>, base: Addr, slots: Vec<SlotRef>) -> Self {
        Self {
            type_symbol: type_symbol.into(),
            base,
            slots,
            declared_size: None,
        }
    }

    /// Describe a table of `count` pointer-sized slots laid out
    /// contiguously from `base`, named `type_symbol[i]`.
    pub fn from_layout(type_symbol: impl Into<String>, base: Addr, count: usize) -> Self {
        let type_symbol = type_symbol.into();
        let entry = std::mem::size_of::<usize>();
        let slots = (0..count)
            .map(|i| SlotRef {
                symbol: format!("{type_symbol}[{i}]"),
                slot: Addr(base.0 + i * entry),
            })
            .collect();
        Self {
            type_symbol,
            base,
            slots,
            declared_size: None,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Offset of each slot from the table base, preserved when mapping
    /// the old table's slots onto the new table. Slots below the base
    /// are malformed and yield nothing.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .filter_map(move |s| s.slot.0.checked_sub(self.base.0))
    }
}
