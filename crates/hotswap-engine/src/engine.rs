//! The reload engine

use crate::{
    CompileQueue, Compiler, MainThreadHandoff, ReloadError, ReloadEvent, ReloadObserver, Result,
};
use hotswap_builder::BuiltModule;
use hotswap_command::{ChangeBatch, Generation, SlotRef, SymbolKind};
use hotswap_loader::{ImageHost, ModuleLoader};
use hotswap_patcher::{DispatchTable, PatchEngine, PatchReport, SlotAccess};
use hotswap_sweeper::{Obj, SweepReport, SweepTargets, Sweeper};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything one completed reload cycle produced.
#[derive(Debug, Clone)]
pub struct ReloadOutcome {
    pub generation: Generation,
    pub source: PathBuf,
    pub module: PathBuf,
    pub patch: PatchReport,
    pub sweep: SweepReport,
}

/// Drives the full cycle: resolve → build → load → patch → sweep.
///
/// The engine is deliberately not `Send`: it holds the patcher's slot
/// capability and the sweeper's application roots, both of which belong
/// to one thread. Compilation can be pushed onto a worker through
/// [`crate::CompileQueue`], with finished builds handed back to
/// [`ReloadEngine::complete`].
pub struct ReloadEngine<H: ImageHost, S: SlotAccess> {
    compiler: Compiler,
    loader: ModuleLoader<H>,
    patcher: PatchEngine<S>,
    sweeper: Sweeper,
    tables: Vec<DispatchTable>,
    observers: Vec<Box<dyn ReloadObserver>>,
}

impl<H: ImageHost, S: SlotAccess> ReloadEngine<H, S> {
    pub fn new(compiler: Compiler, host: H, slots: S) -> Self {
        Self {
            compiler,
            loader: ModuleLoader::new(host),
            patcher: PatchEngine::new(slots),
            sweeper: Sweeper::new(),
            tables: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ReloadObserver>) {
        self.observers.push(observer);
    }

    /// Register a long-lived application object the sweep starts from.
    pub fn add_sweep_root(&mut self, root: Obj) {
        self.sweeper.add_root(root);
    }

    /// Describe a reference type's dispatch table so the patch engine
    /// can rewrite it when the type is replaced.
    pub fn register_dispatch_table(&mut self, table: DispatchTable) {
        self.tables.push(table);
    }

    /// Register interposable call sites; the cumulative redirect map is
    /// replayed onto them immediately.
    pub fn register_callsites(&mut self, sites: Vec<SlotRef>) -> Result<usize> {
        let generation = self.compiler.counter().current();
        Ok(self.patcher.register_callsites(generation, sites)?)
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn patcher(&self) -> &PatchEngine<S> {
        &self.patcher
    }

    /// Reload every rebuildable file in the batch, in order, with the
    /// batch's IDE hint carried into resolution. Per-file failures do
    /// not stop the batch; each path gets its own result.
    pub fn reload(&mut self, batch: &ChangeBatch) -> Vec<(PathBuf, Result<ReloadOutcome>)> {
        let hint = batch.ide_hint.clone();
        batch
            .rebuildable()
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .map(|path| {
                let outcome = self.reload_path(&path, hint.as_deref());
                (path, outcome)
            })
            .collect()
    }

    /// One synchronous reload cycle for `path`.
    pub fn reload_file(&mut self, path: &Path) -> Result<ReloadOutcome> {
        self.reload_path(path, None)
    }

    fn reload_path(&mut self, path: &Path, hint: Option<&Path>) -> Result<ReloadOutcome> {
        let built = match self.compiler.compile_with_hint(path, hint) {
            Ok(built) => built,
            Err(err) => {
                self.emit(ReloadEvent::Failed {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                });
                return Err(err);
            }
        };
        self.complete(&built)
    }

    /// Drain finished builds off the worker's queue, completing each on
    /// the engine's thread through `handoff`. UI hosts pass an executor
    /// that trampolines onto their event loop; headless hosts and tests
    /// pass [`crate::InlineHandoff`]. Returns the per-path results in
    /// completion order; empty when nothing has finished yet.
    pub fn drain_queue(
        &mut self,
        queue: &CompileQueue,
        handoff: &dyn MainThreadHandoff,
    ) -> Vec<(PathBuf, Result<ReloadOutcome>)> {
        let mut finished = Vec::new();
        while let Some(outcome) = queue.try_next() {
            let result = match outcome.result {
                Ok(built) => {
                    let mut completed = None;
                    handoff.run(Box::new(|| completed = Some(self.complete(&built))));
                    // a handoff that dropped the job counts as a closed pipeline
                    completed.unwrap_or(Err(ReloadError::QueueClosed))
                }
                Err(err) => {
                    self.emit(ReloadEvent::Failed {
                        path: outcome.path.clone(),
                        message: err.to_string(),
                    });
                    Err(err)
                }
            };
            finished.push((outcome.path, result));
        }
        finished
    }

    /// Finish a build the worker produced: load, patch, sweep.
    pub fn complete(&mut self, built: &BuiltModule) -> Result<ReloadOutcome> {
        match self.complete_inner(built) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.emit(ReloadEvent::Failed {
                    path: built.source.clone(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn complete_inner(&mut self, built: &BuiltModule) -> Result<ReloadOutcome> {
        let generation = built.generation;
        self.emit(ReloadEvent::Started {
            generation,
            path: built.source.clone(),
        });
        self.emit(ReloadEvent::Built {
            generation,
            module: built.module.clone(),
        });

        let module = self.loader.load(&built.module, generation)?;
        self.emit(ReloadEvent::Loaded {
            generation,
            symbols: module.symbols.len(),
            replaced: module.replaced.len(),
        });

        let report = self.patcher.patch_module(&module, &self.tables)?;
        let candidates = module.replaced.len();
        if candidates > 0 && !report.patched_anything() && report.deferred.is_empty() {
            return Err(ReloadError::PatchPartial {
                generation,
                candidates,
            });
        }
        self.emit(ReloadEvent::Patched {
            generation,
            report: report.clone(),
        });

        let replaced_types: Vec<String> = module
            .replaced
            .iter()
            .filter(|e| matches!(e.kind, SymbolKind::Type { .. }))
            .map(|e| e.mangled.clone())
            .collect();
        let targets = SweepTargets::new(replaced_types, report.deferred.iter().cloned());
        let sweep = self.sweeper.sweep(&targets);
        self.emit(ReloadEvent::Swept {
            generation,
            report: sweep.clone(),
        });

        info!(%generation, source = %built.source.display(), "reload complete");
        self.emit(ReloadEvent::Completed {
            generation,
            path: built.source.clone(),
        });
        Ok(ReloadOutcome {
            generation,
            source: built.source.clone(),
            module: built.module.clone(),
            patch: report,
            sweep,
        })
    }

    /// Reload artifacts left by a previous run of the same executable.
    ///
    /// Modules in the build directory that are newer than `host_exe` were
    /// built against the code the process is running now; loading them in
    /// generation order restores the reload state the previous session
    /// reached. Stale modules (older than the executable) are ignored.
    pub fn replay_previous(&mut self, host_exe: &Path) -> Result<Vec<ReloadOutcome>> {
        let exe_mtime = std::fs::metadata(host_exe)?.modified()?;
        let dir = self.compiler.tmp_dir().to_path_buf();

        let mut found: Vec<(u64, PathBuf)> = Vec::new();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Err(ReloadError::NothingToReplay(dir)),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(generation) = parse_module_generation(&path) else {
                continue;
            };
            let newer = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(|t| t > exe_mtime)
                .unwrap_or(false);
            if newer {
                found.push((generation, path));
            }
        }
        if found.is_empty() {
            return Err(ReloadError::NothingToReplay(dir));
        }
        found.sort_by_key(|(generation, _)| *generation);

        let mut outcomes = Vec::with_capacity(found.len());
        for (number, path) in found {
            let generation = Generation(number);
            self.compiler.counter().advance_past(generation);
            let built = BuiltModule {
                generation,
                source: path.clone(),
                object: path.with_extension("o"),
                module: path.clone(),
                log: path.with_extension("log"),
            };
            match self.complete(&built) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    // A module that no longer loads should not block the
                    // ones after it.
                    warn!(module = %path.display(), %err, "skipping unreplayable module");
                }
            }
        }
        Ok(outcomes)
    }

    fn emit(&self, event: ReloadEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}

/// `reload{N}.so` → `N`.
fn parse_module_generation(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let number = name.strip_prefix("reload")?.strip_suffix(".so")?;
    number.parse().ok()
}
