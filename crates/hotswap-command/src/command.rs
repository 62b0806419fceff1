//! The compilation command resolved for a source unit

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Flags that only make sense when compiling a whole module at once.
/// They are stripped when a command is rewritten for a single-file
/// rebuild; each entry consumes the flag plus one following argument.
const WHOLE_MODULE_FLAGS: &[&str] = &[
    "-filelist",
    "-output-file-map",
    "-emit-module-path",
    "-index-store-path",
    "-pch-output-dir",
    "-supplementary-output-file-map",
];

/// Flags without a following argument that are dropped on rewrite.
const WHOLE_MODULE_BARE_FLAGS: &[&str] = &["-whole-module-optimization", "-index-system-modules"];

/// The exact compiler invocation a full build used for one source unit.
///
/// Immutable once constructed and compared structurally: a cache hit means
/// the stored command is bit-identical to what would be resolved again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationCommand {
    /// Compiler executable.
    pub program: PathBuf,
    /// Ordered argument list, excluding the program itself.
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Declared input files.
    pub inputs: Vec<PathBuf>,
    /// Declared output artifacts.
    pub outputs: Vec<PathBuf>,
    /// Working directory the build ran the command from, when known.
    pub workdir: Option<PathBuf>,
    /// Owning build-target identifier, when the source exposes one.
    pub target: Option<String>,
}

impl CompilationCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            workdir: None,
            target: None,
        }
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    /// The `-target <triple>` / `--target=<triple>` value, if present.
    pub fn target_triple(&self) -> Option<&str> {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "-target" || arg == "--target" {
                return args.next().map(String::as_str);
            }
            if let Some(triple) = arg.strip_prefix("--target=") {
                return Some(triple);
            }
        }
        None
    }

    /// The `-isysroot`/`--sysroot` value, if present.
    pub fn sysroot(&self) -> Option<&str> {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "-isysroot" || arg == "--sysroot" {
                return args.next().map(String::as_str);
            }
            if let Some(root) = arg.strip_prefix("--sysroot=") {
                return Some(root);
            }
        }
        None
    }

    /// Rewrite a command that compiled `primary` as part of a larger unit
    /// into one that compiles exactly that file to exactly one object.
    ///
    /// Whole-module flags are stripped, any previous `-o`/`-primary-file`
    /// pair is removed, and the single input/output pair is appended. The
    /// original command is left untouched; cache entries store it as the
    /// build produced it.
    pub fn into_single_file(&self, primary: &Path, object_out: &Path) -> CompilationCommand {
        let mut args = Vec::with_capacity(self.args.len() + 4);
        let mut iter = self.args.iter().peekable();
        while let Some(arg) = iter.next() {
            if WHOLE_MODULE_FLAGS.contains(&arg.as_str()) {
                iter.next();
                continue;
            }
            if WHOLE_MODULE_BARE_FLAGS.contains(&arg.as_str()) {
                continue;
            }
            if arg == "-o" || arg == "-primary-file" {
                iter.next();
                continue;
            }
            // Other source files in a multi-file invocation drop out.
            if !arg.starts_with('-') && self.inputs.iter().any(|i| i.as_os_str() == arg.as_str())
                && Path::new(arg) != primary
            {
                continue;
            }
            args.push(arg.clone());
        }
        if !args.iter().any(|a| Path::new(a) == primary) {
            args.push(primary.to_string_lossy().into_owned());
        }
        args.push("-o".to_string());
        args.push(object_out.to_string_lossy().into_owned());

        CompilationCommand {
            program: self.program.clone(),
            args,
            env: self.env.clone(),
            inputs: vec![primary.to_path_buf()],
            outputs: vec![object_out.to_path_buf()],
            workdir: self.workdir.clone(),
            target: self.target.clone(),
        }
    }
}
