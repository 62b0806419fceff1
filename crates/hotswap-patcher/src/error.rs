//! Error types for patching

use hotswap_command::Addr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PatchError>;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("slot {0} is not readable")]
    UnreadableSlot(Addr),

    #[error("slot {0} is not writable")]
    UnwritableSlot(Addr),

    #[error("dispatch table for {symbol} has no slots")]
    EmptyTable { symbol: String },
}
