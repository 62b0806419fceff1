//! Workspace/toolchain fingerprint used to invalidate cached commands

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// A token for the current workspace + toolchain configuration.
///
/// Cached compilation commands are only trusted while the fingerprint
/// they were stored under matches the one computed now; a toolchain
/// upgrade or workspace reconfiguration changes the digest and invalidates
/// the whole cache at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest the workspace root path, the toolchain identity string, and
    /// the modification time of the workspace's build configuration file
    /// (if one exists at `config`).
    pub fn compute(workspace_root: &Path, toolchain: &str, config: Option<&Path>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(workspace_root.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(toolchain.as_bytes());
        if let Some(config) = config {
            if let Ok(meta) = std::fs::metadata(config) {
                if let Ok(modified) = meta.modified() {
                    if let Ok(secs) = modified.duration_since(std::time::SystemTime::UNIX_EPOCH) {
                        hasher.update(secs.as_secs().to_le_bytes());
                    }
                }
            }
        }
        let digest = hasher.finalize();
        Self(hex(&digest[..16]))
    }

    /// Build a fingerprint from an already-rendered token. Used by tests
    /// and by callers that persist the string form.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
