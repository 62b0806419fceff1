//! Error types for module building

use hotswap_command::ToolError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("compiling {path} failed: {source} — see {log}")]
    Compile {
        path: PathBuf,
        #[source]
        source: ToolError,
        log: PathBuf,
    },

    #[error("linking {module} failed: {source} — see {log}")]
    Link {
        module: PathBuf,
        #[source]
        source: ToolError,
        log: PathBuf,
    },

    #[error("signing {module} failed: {source}")]
    Sign {
        module: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("compiler produced no object at {0}")]
    MissingObject(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// The last lines of the build log, for surfacing compiler diagnostics
    /// in a reload-failed event without making the caller read the file.
    pub fn log_excerpt(&self, max_lines: usize) -> Option<String> {
        let log = match self {
            BuildError::Compile { log, .. } | BuildError::Link { log, .. } => log,
            _ => return None,
        };
        let contents = std::fs::read_to_string(log).ok()?;
        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        Some(lines[start..].join("\n"))
    }
}
