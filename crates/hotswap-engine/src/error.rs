//! Error types for the reload pipeline

use hotswap_command::Generation;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReloadError>;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("resolve failed: {0}")]
    Resolve(#[from] hotswap_resolver::ResolveError),

    #[error("build failed: {0}")]
    Build(#[from] hotswap_builder::BuildError),

    #[error("load failed: {0}")]
    Load(#[from] hotswap_loader::LoadError),

    #[error("patch failed: {0}")]
    Patch(#[from] hotswap_patcher::PatchError),

    #[error(
        "generation {generation} replaced {candidates} definitions but \
         none could be patched into the process"
    )]
    PatchPartial {
        generation: Generation,
        candidates: usize,
    },

    #[error("compile worker is gone; the queue was shut down")]
    QueueClosed,

    #[error("no previous artifacts to replay under {0}")]
    NothingToReplay(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
