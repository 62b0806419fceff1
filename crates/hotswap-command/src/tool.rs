//! External tool invocation with timeouts
//!
//! The compiler, linker, and build-graph exporter are all slow external
//! processes; every invocation goes through [`run_tool`], which captures
//! output to a log file and kills the child when the deadline passes so a
//! wedged tool surfaces as a failure instead of a hang.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::CompilationCommand;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with status {status} (log: {log})")]
    Failed {
        program: String,
        status: i32,
        log: String,
    },

    #[error("{program} timed out after {seconds}s and was killed")]
    TimedOut { program: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A concrete process invocation derived from a [`CompilationCommand`] or
/// constructed directly for a linker/signer step.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workdir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

impl From<&CompilationCommand> for ToolInvocation {
    fn from(command: &CompilationCommand) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
            env: command.env.clone(),
            workdir: command.workdir.clone(),
        }
    }
}

/// Run a tool to completion, teeing stdout+stderr into `log`, enforcing
/// `timeout`. Success means exit status zero.
pub fn run_tool(invocation: &ToolInvocation, log: &Path, timeout: Duration) -> Result<(), ToolError> {
    let program = invocation.program.to_string_lossy().into_owned();
    let out = File::create(log)?;
    let err = out.try_clone()?;

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err));
    for (key, value) in &invocation.env {
        command.env(key, value);
    }
    if let Some(dir) = &invocation.workdir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|source| ToolError::Spawn {
        program: program.clone(),
        source,
    })?;

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            if status.success() {
                return Ok(());
            }
            return Err(ToolError::Failed {
                program,
                status: status.code().unwrap_or(-1),
                log: log.display().to_string(),
            });
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::TimedOut {
                program,
                seconds: timeout.as_secs(),
            });
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
