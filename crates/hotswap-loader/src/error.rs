//! Error types for module loading

use hotswap_command::ToolError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not load {path}: {detail}{}", hint_suffix(.hint))]
    Open {
        path: PathBuf,
        detail: String,
        /// Human guidance derived from the loader's error text.
        hint: Option<String>,
    },

    #[error("symbol {symbol} not found in {path}")]
    MissingSymbol { symbol: String, path: PathBuf },

    #[error("reading symbol table of {path} failed: {source}")]
    SymbolTable {
        path: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("unparseable symbol table line: {0}")]
    MalformedSymbolLine(String),

    #[error("image {0} was never opened by this host")]
    UnknownImage(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" ({hint})"),
        None => String::new(),
    }
}

impl LoadError {
    /// Classify a loader failure message into an [`LoadError::Open`] with
    /// actionable guidance. The loader's own text is kept verbatim.
    pub fn from_open_failure(path: &std::path::Path, detail: String) -> Self {
        let lower = detail.to_lowercase();
        let hint = if lower.contains("undefined symbol") {
            Some(
                "the module references symbols the process does not export; \
                 rebuild the project and relaunch, then retry the reload"
                    .to_string(),
            )
        } else if lower.contains("signature") {
            Some("the module is unsigned or signed with the wrong identity; configure a signer".to_string())
        } else if lower.contains("wrong elf class")
            || lower.contains("architecture")
            || lower.contains("mach-o")
        {
            Some("the module was built for a different architecture than the process".to_string())
        } else {
            None
        };
        LoadError::Open {
            path: path.to_path_buf(),
            detail,
            hint,
        }
    }

    /// Whether a retry after a clean rebuild could plausibly succeed.
    pub fn retryable(&self) -> bool {
        match self {
            LoadError::Open { hint, .. } => hint
                .as_deref()
                .is_some_and(|h| h.contains("rebuild")),
            LoadError::SymbolTable { .. } | LoadError::Io(_) => true,
            _ => false,
        }
    }
}
