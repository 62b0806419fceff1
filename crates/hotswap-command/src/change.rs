//! Change batches delivered by the external file notifier

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// A batch of file changes plus the hint identifying which IDE process
/// saved them, used by the resolver to disambiguate between multiple
/// build configurations writing logs for the same tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub changes: Vec<SourceChange>,
    pub ide_hint: Option<PathBuf>,
}

impl ChangeBatch {
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            changes: vec![SourceChange {
                path: path.into(),
                kind: ChangeKind::Modified,
            }],
            ide_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<PathBuf>) -> Self {
        self.ide_hint = Some(hint.into());
        self
    }

    /// Paths that still exist and are worth rebuilding.
    pub fn rebuildable(&self) -> impl Iterator<Item = &PathBuf> {
        self.changes
            .iter()
            .filter(|c| c.kind != ChangeKind::Removed)
            .map(|c| &c.path)
    }
}
