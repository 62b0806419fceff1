//! Post-link module signing

use crate::{BuildError, Result};
use hotswap_command::{run_tool, ToolInvocation};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Platforms that verify dynamic modules at load time need the freshly
/// linked module signed before dlopen will accept it. Platforms that do
/// not use [`NoopSigner`].
pub trait Signer: Send + Sync {
    fn sign(&self, module: &Path) -> Result<()>;
}

/// No signing step; the default on platforms without load-time checks.
#[derive(Default)]
pub struct NoopSigner;

impl Signer for NoopSigner {
    fn sign(&self, _module: &Path) -> Result<()> {
        Ok(())
    }
}

/// Signs by invoking an external signing tool with the module path
/// appended as the final argument.
pub struct ToolSigner {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolSigner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Signer for ToolSigner {
    fn sign(&self, module: &Path) -> Result<()> {
        let invocation = ToolInvocation::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(module.to_string_lossy().into_owned());
        let log = module.with_extension("sign.log");
        run_tool(&invocation, &log, self.timeout).map_err(|source| BuildError::Sign {
            module: module.to_path_buf(),
            source,
        })?;
        debug!(module = %module.display(), "module signed");
        Ok(())
    }
}
