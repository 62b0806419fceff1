//! Compile and link one changed file into a loadable module

use crate::{BuildError, NoopSigner, Result, Signer};
use hotswap_command::{run_tool, CompilationCommand, Generation, ToolInvocation};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Builder knobs. Defaults suit a Linux host with `cc` on PATH.
pub struct BuildConfig {
    /// Where objects, modules, and build logs land.
    pub tmp_dir: PathBuf,
    /// Linker driver used to produce the dynamic module.
    pub linker: PathBuf,
    /// Arguments passed to the linker before the object file.
    pub link_args: Vec<String>,
    /// Deadline applied to each compiler/linker invocation.
    pub tool_timeout: Duration,
}

impl BuildConfig {
    pub fn new(tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            linker: PathBuf::from("cc"),
            // Unresolved symbols stay unresolved until dlopen binds them
            // against the running process.
            link_args: vec![
                "-shared".to_string(),
                "-fPIC".to_string(),
                "-Wl,--unresolved-symbols=ignore-all".to_string(),
            ],
            tool_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_linker(mut self, linker: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.linker = linker.into();
        self.link_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }
}

/// The artifacts of one successful generation build.
#[derive(Debug, Clone)]
pub struct BuiltModule {
    pub generation: Generation,
    pub source: PathBuf,
    pub object: PathBuf,
    pub module: PathBuf,
    pub log: PathBuf,
}

/// Runs the compile → link → sign pipeline for one source file.
pub struct ModuleBuilder {
    config: BuildConfig,
    signer: Box<dyn Signer>,
}

impl ModuleBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            signer: Box::new(NoopSigner),
        }
    }

    pub fn with_signer(mut self, signer: Box<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.config.tmp_dir
    }

    /// Build `path` with the resolved `command`, producing the artifacts
    /// for `generation`.
    pub fn build(
        &self,
        command: &CompilationCommand,
        path: &Path,
        generation: Generation,
    ) -> Result<BuiltModule> {
        std::fs::create_dir_all(&self.config.tmp_dir)?;
        let object = generation.artifact_in(&self.config.tmp_dir, Generation::object_name);
        let module = generation.artifact_in(&self.config.tmp_dir, Generation::module_name);
        let log = generation.artifact_in(&self.config.tmp_dir, Generation::log_name);

        self.compile(command, path, &object, &log)?;
        self.link(command, &object, &module, &log)?;
        self.signer.sign(&module)?;

        info!(
            %generation,
            source = %path.display(),
            module = %module.display(),
            "module built"
        );
        Ok(BuiltModule {
            generation,
            source: path.to_path_buf(),
            object,
            module,
            log,
        })
    }

    /// Like [`ModuleBuilder::build`], but with `transform` applied to the
    /// source text for the duration of the compile. The original bytes
    /// are restored whether the build succeeds or fails.
    pub fn build_patched<F>(
        &self,
        command: &CompilationCommand,
        path: &Path,
        generation: Generation,
        transform: F,
    ) -> Result<BuiltModule>
    where
        F: FnOnce(&str) -> String,
    {
        let _shim = crate::SourceShim::apply(path, transform)?;
        self.build(command, path, generation)
    }

    fn compile(
        &self,
        command: &CompilationCommand,
        path: &Path,
        object: &Path,
        log: &Path,
    ) -> Result<()> {
        let single = command.into_single_file(path, object);
        debug!(program = %single.program.display(), source = %path.display(), "compiling");
        let invocation = ToolInvocation::from(&single);
        run_tool(&invocation, log, self.config.tool_timeout).map_err(|source| {
            BuildError::Compile {
                path: path.to_path_buf(),
                source,
                log: log.to_path_buf(),
            }
        })?;
        if !object.exists() {
            return Err(BuildError::MissingObject(object.to_path_buf()));
        }
        Ok(())
    }

    fn link(
        &self,
        command: &CompilationCommand,
        object: &Path,
        module: &Path,
        log: &Path,
    ) -> Result<()> {
        debug!(object = %object.display(), module = %module.display(), "linking");
        let mut invocation = ToolInvocation::new(&self.config.linker)
            .args(self.config.link_args.iter().cloned());
        // The module must link for the same target the process was built
        // for, or the loader will refuse it.
        if let Some(triple) = command.target_triple() {
            invocation = invocation.arg("-target").arg(triple);
        }
        if let Some(root) = command.sysroot() {
            invocation = invocation.arg("-isysroot").arg(root);
        }
        let invocation = invocation
            .arg(object.to_string_lossy().into_owned())
            .arg("-o")
            .arg(module.to_string_lossy().into_owned());
        let link_log = log.with_extension("link.log");
        run_tool(&invocation, &link_log, self.config.tool_timeout).map_err(|source| {
            BuildError::Link {
                module: module.to_path_buf(),
                source,
                log: link_log.clone(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    /// A stand-in compiler/linker: copies the named input to the -o target.
    fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Parses "-o OUT" from "$@" and writes a marker file there.
    const EMIT_TO_O: &str = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
[ -n "$out" ] && echo built > "$out"
"#;

    #[test]
    fn test_build_produces_object_module_and_log() {
        let dir = tempdir().unwrap();
        let cc = fake_tool(dir.path(), "cc", EMIT_TO_O);
        let source = dir.path().join("widget.c");
        fs::write(&source, "int f() { return 1; }\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);

        let command = CompilationCommand::new(&cc, vec!["-c".into()]);
        let built = builder.build(&command, &source, Generation(3)).unwrap();

        assert!(built.object.exists());
        assert!(built.module.exists());
        assert!(built.object.ends_with("reload3.o"));
        assert!(built.module.ends_with("reload3.so"));
    }

    #[test]
    fn test_compile_failure_names_the_log() {
        let dir = tempdir().unwrap();
        let cc = fake_tool(dir.path(), "cc", "echo 'widget.c:3: error: oops' >&2; exit 1");
        let source = dir.path().join("widget.c");
        fs::write(&source, "broken\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);

        let command = CompilationCommand::new(&cc, vec!["-c".into()]);
        let err = builder.build(&command, &source, Generation(1)).unwrap_err();
        match &err {
            BuildError::Compile { log, .. } => {
                assert!(log.ends_with("reload1.log"));
                let excerpt = err.log_excerpt(5).unwrap();
                assert!(excerpt.contains("error: oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_object_detected() {
        let dir = tempdir().unwrap();
        // Succeeds but never writes the object.
        let cc = fake_tool(dir.path(), "cc", "exit 0");
        let source = dir.path().join("widget.c");
        fs::write(&source, "int f();\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);

        let command = CompilationCommand::new(&cc, vec!["-c".into()]);
        let err = builder.build(&command, &source, Generation(2)).unwrap_err();
        assert!(matches!(err, BuildError::MissingObject(_)));
    }

    #[test]
    fn test_patched_build_restores_the_source() {
        let dir = tempdir().unwrap();
        // Copies the first non-flag argument to the -o target, so the
        // object captures what the compiler actually saw.
        let cc = fake_tool(
            dir.path(),
            "cc",
            r#"
out=""; src=""; prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  case "$arg" in -*) ;; *) [ "$prev" != "-o" ] && src="$arg" ;; esac
  prev="$arg"
done
[ -n "$out" ] && cp "$src" "$out"
"#,
        );
        let source = dir.path().join("widget.c");
        fs::write(&source, "int version = 1;\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);
        let command = CompilationCommand::new(&cc, vec!["-c".into()]);

        let built = builder
            .build_patched(&command, &source, Generation(1), |text| {
                text.replace('1', "2")
            })
            .unwrap();

        // The compiler saw the patched text, the file got its bytes back.
        assert_eq!(
            fs::read_to_string(&built.object).unwrap(),
            "int version = 2;\n"
        );
        assert_eq!(fs::read_to_string(&source).unwrap(), "int version = 1;\n");
    }

    #[test]
    fn test_link_carries_the_command_target() {
        let dir = tempdir().unwrap();
        // Records its argument vector next to emitting the output.
        let cc = fake_tool(
            dir.path(),
            "cc",
            &format!(
                "echo \"$@\" >> {}\n{}",
                dir.path().join("args.txt").display(),
                EMIT_TO_O
            ),
        );
        let source = dir.path().join("widget.c");
        fs::write(&source, "int f();\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);
        let command = CompilationCommand::new(
            &cc,
            vec![
                "-c".into(),
                "-target".into(),
                "x86_64-unknown-linux-gnu".into(),
            ],
        );

        builder.build(&command, &source, Generation(1)).unwrap();
        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        // Both the compile and the link line name the target triple.
        assert_eq!(args.matches("x86_64-unknown-linux-gnu").count(), 2);
    }

    #[test]
    fn test_generations_do_not_collide() {
        let dir = tempdir().unwrap();
        let cc = fake_tool(dir.path(), "cc", EMIT_TO_O);
        let source = dir.path().join("widget.c");
        fs::write(&source, "int f();\n").unwrap();

        let config = BuildConfig::new(dir.path().join("build")).with_linker(&cc, vec![]);
        let builder = ModuleBuilder::new(config);
        let command = CompilationCommand::new(&cc, vec!["-c".into()]);

        let a = builder.build(&command, &source, Generation(1)).unwrap();
        let b = builder.build(&command, &source, Generation(2)).unwrap();
        assert_ne!(a.module, b.module);
        assert!(a.module.exists() && b.module.exists());
    }
}
