//! The sweep proper

use crate::{Obj, Reflectable, ValueKind};
use std::collections::HashSet;
use tracing::{debug, info};

/// Which types the sweep acts on, derived from a patch pass.
#[derive(Debug, Clone, Default)]
pub struct SweepTargets {
    /// Types replaced this generation; their instances get the reload
    /// notification.
    pub replaced: HashSet<String>,
    /// Types whose dispatch fixup was deferred to per-instance work.
    pub deferred: HashSet<String>,
}

impl SweepTargets {
    pub fn new(
        replaced: impl IntoIterator<Item = String>,
        deferred: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            replaced: replaced.into_iter().collect(),
            deferred: deferred.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replaced.is_empty() && self.deferred.is_empty()
    }
}

/// What a sweep accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Objects reached, counting each exactly once.
    pub visited: usize,
    /// Reload notifications delivered.
    pub hooks_invoked: usize,
    /// Per-instance dispatch fixups that reported doing work.
    pub repointed: usize,
}

/// Walks the live object graph from registered roots.
#[derive(Default)]
pub struct Sweeper {
    roots: Vec<Obj>,
}

impl Sweeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root the sweep starts from. Applications register
    /// their long-lived top-level objects once, at startup.
    pub fn add_root(&mut self, root: Obj) {
        self.roots.push(root);
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Visit every object reachable from the roots once, delivering the
    /// reload hook to instances of replaced types and the dispatch fixup
    /// to instances of deferred types.
    pub fn sweep(&self, targets: &SweepTargets) -> SweepReport {
        let mut report = SweepReport::default();
        if targets.is_empty() {
            debug!("sweep skipped, no target types");
            return report;
        }

        let mut seen: HashSet<*const ()> = HashSet::new();
        let mut stack: Vec<Obj> = self.roots.clone();

        while let Some(obj) = stack.pop() {
            let identity = identity_of(&obj);
            if !seen.insert(identity) {
                continue;
            }
            report.visited += 1;

            if obj.kind() == ValueKind::Opaque {
                continue;
            }
            let symbol = obj.type_symbol();
            if targets.deferred.contains(symbol) && obj.repoint_dispatch() {
                report.repointed += 1;
            }
            if targets.replaced.contains(symbol) {
                obj.reloaded();
                report.hooks_invoked += 1;
            }

            stack.extend(obj.children());
        }

        info!(
            visited = report.visited,
            hooks = report.hooks_invoked,
            repointed = report.repointed,
            "sweep complete"
        );
        report
    }
}

fn identity_of(obj: &Obj) -> *const () {
    std::rc::Rc::as_ptr(obj) as *const ()
}
