//! The patch engine

use crate::{DispatchTable, PatchError, Result, SlotAccess};
use hotswap_command::{Addr, Generation, SlotRef, SymbolKind};
use hotswap_loader::LoadedModule;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What one patch pass accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Dispatch-table slots rewritten to point at new implementations.
    pub slots_patched: usize,
    /// Call-site indirection slots redirected.
    pub callsites_redirected: usize,
    /// Slots that already held the right address or held nothing new.
    pub skipped: usize,
    /// Type symbols whose declared size changed between generations.
    pub size_mismatches: Vec<String>,
    /// Non-dispatch types whose instances the object sweep must visit.
    pub deferred: Vec<String>,
}

impl PatchReport {
    pub fn patched_anything(&self) -> bool {
        self.slots_patched > 0 || self.callsites_redirected > 0
    }

    fn merge(&mut self, other: PatchReport) {
        self.slots_patched += other.slots_patched;
        self.callsites_redirected += other.callsites_redirected;
        self.skipped += other.skipped;
        self.size_mismatches.extend(other.size_mismatches);
        self.deferred.extend(other.deferred);
    }
}

/// One slot write, kept for diagnostics and rollback analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub generation: Generation,
    pub symbol: String,
    pub slot: Addr,
    pub from: Addr,
    pub to: Addr,
}

/// Rewrites dispatch slots and redirects call sites.
///
/// The engine owns the cumulative interpose map: symbol → newest
/// implementation across every generation so far. Each newly loaded
/// module has the whole map replayed onto its call sites, so code built
/// in generation N+1 calls into N's replacements instead of resolving
/// back to the original build.
pub struct PatchEngine<S: SlotAccess> {
    slots: S,
    interposes: HashMap<String, Addr>,
    callsites: Vec<SlotRef>,
    history: Vec<PatchRecord>,
}

impl<S: SlotAccess> PatchEngine<S> {
    pub fn new(slots: S) -> Self {
        Self {
            slots,
            interposes: HashMap::new(),
            callsites: Vec::new(),
            history: Vec::new(),
        }
    }

    /// The newest implementation recorded for `symbol`, if any
    /// generation has replaced it.
    pub fn interposed(&self, symbol: &str) -> Option<Addr> {
        self.interposes.get(symbol).copied()
    }

    pub fn history(&self) -> &[PatchRecord] {
        &self.history
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Register indirection slots (for the base image or a newly loaded
    /// module) and immediately replay the cumulative interpose map onto
    /// them. Returns how many were redirected.
    pub fn register_callsites(
        &mut self,
        generation: Generation,
        sites: Vec<SlotRef>,
    ) -> Result<usize> {
        let start = self.callsites.len();
        self.callsites.extend(sites);
        let redirected = self.redirect_range(generation, start)?;
        if redirected > 0 {
            debug!(%generation, redirected, "interposes replayed onto new call sites");
        }
        Ok(redirected)
    }

    /// Apply one loaded module: absorb its replaced functions into the
    /// interpose map, redirect every known call site, and rewrite the
    /// dispatch tables of its replaced reference types.
    pub fn patch_module(
        &mut self,
        module: &LoadedModule,
        tables: &[DispatchTable],
    ) -> Result<PatchReport> {
        let generation = module.generation;
        let mut report = PatchReport::default();

        for entity in module.replaced_functions() {
            self.interposes.insert(entity.mangled.clone(), entity.new);
        }
        report.callsites_redirected = self.redirect_range(generation, 0)?;

        for entity in &module.replaced {
            match entity.kind {
                SymbolKind::Function | SymbolKind::Global => {}
                SymbolKind::Type { dispatch: true } => {
                    // Generic instantiations carry per-instance tables;
                    // the shared descriptor cannot be patched in place.
                    if entity.mangled.contains('<') {
                        debug!(symbol = %entity.mangled, "generic type deferred to sweep");
                        report.deferred.push(entity.mangled.clone());
                        continue;
                    }
                    let Some(table) = tables.iter().find(|t| t.type_symbol == entity.mangled)
                    else {
                        warn!(symbol = %entity.mangled, "replaced type has no table description, deferring to sweep");
                        report.deferred.push(entity.mangled.clone());
                        continue;
                    };
                    if let (Some(old), Some(new)) = (entity.old_size, entity.new_size) {
                        if old != new {
                            warn!(
                                symbol = %entity.mangled,
                                old, new,
                                "type layout changed size; stored instances keep the old layout"
                            );
                            report.size_mismatches.push(entity.mangled.clone());
                        }
                    }
                    let table_report =
                        self.patch_table(generation, table, entity.old, entity.new)?;
                    report.merge(table_report);
                }
                SymbolKind::Type { dispatch: false } => {
                    report.deferred.push(entity.mangled.clone());
                }
            }
        }

        info!(
            %generation,
            slots = report.slots_patched,
            callsites = report.callsites_redirected,
            deferred = report.deferred.len(),
            "patch pass complete"
        );
        Ok(report)
    }

    /// Rewrite one old table against its replacement. Only slots whose
    /// contents differ are written; matching slots were not overridden by
    /// the rebuilt type and must keep dispatching to inherited code.
    fn patch_table(
        &mut self,
        generation: Generation,
        table: &DispatchTable,
        old_base: Addr,
        new_base: Addr,
    ) -> Result<PatchReport> {
        if table.slots.is_empty() {
            return Err(PatchError::EmptyTable {
                symbol: table.type_symbol.clone(),
            });
        }
        let mut report = PatchReport::default();
        for slot_ref in &table.slots {
            // a slot below the table base is a malformed description
            let Some(offset) = slot_ref.slot.0.checked_sub(table.base.0) else {
                warn!(symbol = %slot_ref.symbol, slot = %slot_ref.slot, "slot precedes its table base, skipping");
                report.skipped += 1;
                continue;
            };
            let old_slot = Addr(old_base.0 + offset);
            let new_slot = Addr(new_base.0 + offset);

            let Some(current) = self.slots.read(old_slot) else {
                report.skipped += 1;
                continue;
            };
            let Some(replacement) = self.slots.read(new_slot) else {
                report.skipped += 1;
                continue;
            };
            if replacement.is_null() || replacement == current {
                report.skipped += 1;
                continue;
            }
            self.slots.write(old_slot, replacement)?;
            // read-back: a write the slot did not take is a hard error
            if self.slots.read(old_slot) != Some(replacement) {
                return Err(PatchError::UnwritableSlot(old_slot));
            }
            self.history.push(PatchRecord {
                generation,
                symbol: slot_ref.symbol.clone(),
                slot: old_slot,
                from: current,
                to: replacement,
            });
            report.slots_patched += 1;
        }
        Ok(report)
    }

    /// Redirect registered call sites from `start` onward to the newest
    /// implementation of their symbol.
    fn redirect_range(&mut self, generation: Generation, start: usize) -> Result<usize> {
        let mut redirected = 0;
        // indices, not iterators: writes need &mut self.slots
        for i in start..self.callsites.len() {
            let site = self.callsites[i].clone();
            let Some(&target) = self.interposes.get(&site.symbol) else {
                continue;
            };
            let Some(current) = self.slots.read(site.slot) else {
                continue;
            };
            if current == target {
                continue;
            }
            self.slots.write(site.slot, target)?;
            self.history.push(PatchRecord {
                generation,
                symbol: site.symbol.clone(),
                slot: site.slot,
                from: current,
                to: target,
            });
            redirected += 1;
        }
        Ok(redirected)
    }
}
