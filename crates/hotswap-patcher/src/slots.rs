//! The slot capability: the one place addresses are dereferenced

use crate::{PatchError, Result};
use hotswap_command::Addr;
use std::collections::HashMap;
use tracing::trace;

/// Read and write pointer-sized dispatch slots.
///
/// Everything above this trait treats [`Addr`] as an opaque token; only
/// implementations of `SlotAccess` turn one into a pointer. Tests run
/// against [`MemorySlots`], the live process against [`ProcessSlots`].
pub trait SlotAccess: Send {
    /// Current value held in the slot at `slot`, or `None` if the slot
    /// is not mapped.
    fn read(&self, slot: Addr) -> Option<Addr>;

    /// Store `value` into the slot at `slot`.
    fn write(&mut self, slot: Addr, value: Addr) -> Result<()>;
}

/// Simulated slot memory for tests: a map from slot address to content.
#[derive(Default)]
pub struct MemorySlots {
    cells: HashMap<Addr, Addr>,
    frozen: bool,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot.
    pub fn set(&mut self, slot: Addr, value: Addr) {
        self.cells.insert(slot, value);
    }

    /// Make all subsequent writes fail, simulating read-only memory.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl SlotAccess for MemorySlots {
    fn read(&self, slot: Addr) -> Option<Addr> {
        self.cells.get(&slot).copied()
    }

    fn write(&mut self, slot: Addr, value: Addr) -> Result<()> {
        if self.frozen {
            return Err(PatchError::UnwritableSlot(slot));
        }
        if !self.cells.contains_key(&slot) {
            return Err(PatchError::UnwritableSlot(slot));
        }
        self.cells.insert(slot, value);
        Ok(())
    }
}

/// Raw in-process slot access.
///
/// Slots handed to this accessor must point into mapped, writable data
/// (dispatch tables and indirection tables live in writable sections
/// once the loader has relocated them). Passing an address that is
/// unmapped or read-only is undefined behavior; callers uphold this by
/// only deriving slots from harvested symbol tables.
#[derive(Default)]
pub struct ProcessSlots;

impl ProcessSlots {
    pub fn new() -> Self {
        Self
    }
}

impl SlotAccess for ProcessSlots {
    fn read(&self, slot: Addr) -> Option<Addr> {
        if slot.is_null() {
            return None;
        }
        let value = unsafe { std::ptr::read_volatile(slot.0 as *const usize) };
        Some(Addr(value))
    }

    fn write(&mut self, slot: Addr, value: Addr) -> Result<()> {
        if slot.is_null() {
            return Err(PatchError::UnwritableSlot(slot));
        }
        trace!(%slot, %value, "slot write");
        unsafe { std::ptr::write_volatile(slot.0 as *mut usize, value.0) };
        Ok(())
    }
}
