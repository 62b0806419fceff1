//! Error types for command resolution

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "could not locate a compile command for {0}. \
         The file may not be part of the current project, the build may \
         not have produced logs yet, or the build used whole-module \
         optimization. Build once and retry."
    )]
    CommandNotFound(PathBuf),

    #[error(
        "cached command for {path} was recorded under fingerprint {cached}, \
         but the workspace is now at {current}; re-resolution also failed"
    )]
    StaleWorkspace {
        path: PathBuf,
        cached: String,
        current: String,
    },

    #[error("external lookup failed: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("malformed action graph: {0}")]
    ActionGraph(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("database creation error: {0}")]
    DatabaseCreation(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
}
