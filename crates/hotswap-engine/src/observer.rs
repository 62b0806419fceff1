//! Reload notifications

use hotswap_command::Generation;
use hotswap_patcher::PatchReport;
use hotswap_sweeper::SweepReport;
use std::path::PathBuf;

/// Milestones of one reload cycle.
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    Started {
        generation: Generation,
        path: PathBuf,
    },
    Built {
        generation: Generation,
        module: PathBuf,
    },
    Loaded {
        generation: Generation,
        symbols: usize,
        replaced: usize,
    },
    Patched {
        generation: Generation,
        report: PatchReport,
    },
    Swept {
        generation: Generation,
        report: SweepReport,
    },
    Completed {
        generation: Generation,
        path: PathBuf,
    },
    Failed {
        path: PathBuf,
        message: String,
    },
}

/// Receives [`ReloadEvent`]s as the engine works. Observers run on the
/// engine's thread and should return quickly.
pub trait ReloadObserver {
    fn on_event(&self, event: &ReloadEvent);
}
