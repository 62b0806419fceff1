//! Compile-command recovery by scraping build logs
//!
//! Build systems that keep per-build textual logs record one compile
//! invocation line per translation unit. The scraper walks the log files
//! newest-first, finds the most recent line that compiled the changed
//! path, and reconstructs a [`CompilationCommand`] from it: the line's
//! argument vector, the working directory established by the closest
//! preceding `cd` line, and — for multi-file invocations driven by a
//! `-filelist` — the full input set recovered from the invocation's JSON
//! output-file map.

use crate::{CommandSource, ResolveError, Result};
use hotswap_command::{split_words, CompilationCommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Scrapes compile commands out of a build's log directory.
///
/// Several log directories may exist when more than one IDE or build
/// configuration writes logs for the same tree; the originating-process
/// hint carried by the change batch picks the right one, otherwise all
/// are searched newest-first.
pub struct BuildLogScraper {
    log_dirs: Vec<PathBuf>,
    /// Arguments whose presence marks a line as a compile invocation.
    compile_markers: Vec<String>,
}

impl BuildLogScraper {
    pub fn new(log_dirs: Vec<PathBuf>) -> Self {
        Self {
            log_dirs,
            compile_markers: vec!["-c".to_string(), "-primary-file".to_string()],
        }
    }

    pub fn single_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(vec![dir.into()])
    }

    /// Log files across all directories, most recently modified first,
    /// with directories whose path mentions the hinted IDE process
    /// ordered ahead of the rest.
    fn log_files(&self, hint: Option<&Path>) -> Vec<PathBuf> {
        let hint_stem = hint
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().to_lowercase());

        let mut files: Vec<(bool, SystemTime, PathBuf)> = Vec::new();
        for dir in &self.log_dirs {
            let preferred = match (&hint_stem, dir.to_str()) {
                (Some(stem), Some(d)) => d.to_lowercase().contains(stem.as_str()),
                _ => false,
            };
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("log") {
                    continue;
                }
                let mtime = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((preferred, mtime, path));
            }
        }
        files.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        files.into_iter().map(|(_, _, p)| p).collect()
    }

    /// Scan one log's lines for the newest compile of `path`.
    fn scan_log(&self, log: &Path, path: &Path) -> Result<Option<CompilationCommand>> {
        let contents = std::fs::read_to_string(log)?;
        let wanted = path.to_string_lossy();

        let mut workdir: Option<PathBuf> = None;
        let mut found: Option<(Vec<String>, Option<PathBuf>)> = None;

        for line in contents.lines() {
            let trimmed = line.trim();
            if let Some(dir) = trimmed.strip_prefix("cd ") {
                let dir = dir.trim().trim_matches('"');
                workdir = Some(PathBuf::from(dir));
                continue;
            }
            if !trimmed.contains(wanted.as_ref()) {
                continue;
            }
            let words = split_words(trimmed);
            if words.len() < 2 {
                continue;
            }
            let is_compile = self
                .compile_markers
                .iter()
                .any(|m| words.iter().any(|w| w == m));
            let names_source = words.iter().any(|w| Path::new(w) == path);
            if is_compile && names_source {
                // keep scanning: the last match in the file is the newest
                found = Some((words, workdir.clone()));
            }
        }

        let Some((words, workdir)) = found else {
            return Ok(None);
        };
        Ok(Some(self.command_from_words(words, workdir, path)?))
    }

    fn command_from_words(
        &self,
        mut words: Vec<String>,
        workdir: Option<PathBuf>,
        path: &Path,
    ) -> Result<CompilationCommand> {
        let program = PathBuf::from(words.remove(0));
        let mut inputs = vec![path.to_path_buf()];

        // A -filelist invocation compiles a whole unit; recover the unit's
        // real input set from the JSON output-file map so the single-file
        // rewrite can discard the siblings knowingly.
        if let Some(pos) = words.iter().position(|w| w == "-filelist") {
            let map = words
                .iter()
                .position(|w| w == "-output-file-map")
                .and_then(|i| words.get(i + 1).cloned());
            if pos + 1 < words.len() {
                words.drain(pos..=pos + 1);
            }
            if let Some(map_path) = map {
                match std::fs::read_to_string(&map_path)
                    .map_err(|e| e.to_string())
                    .and_then(|text| {
                        serde_json::from_str::<Value>(&text).map_err(|e| e.to_string())
                    }) {
                    Ok(Value::Object(entries)) => {
                        for key in entries.keys().filter(|k| !k.is_empty()) {
                            let input = PathBuf::from(key);
                            if input != path {
                                inputs.push(input);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        debug!(map = %map_path, err, "output-file map unreadable, single input assumed");
                    }
                }
            }
        }

        let mut outputs = Vec::new();
        if let Some(pos) = words.iter().position(|w| w == "-o") {
            if let Some(out) = words.get(pos + 1) {
                outputs.push(PathBuf::from(out));
            }
        }

        let mut command = CompilationCommand::new(program, words).with_inputs(inputs);
        command.outputs = outputs;
        command.workdir = workdir;
        Ok(command)
    }
}

impl CommandSource for BuildLogScraper {
    fn lookup(&self, path: &Path) -> Result<Option<CompilationCommand>> {
        self.lookup_with_hint(path, None)
    }

    fn lookup_with_hint(
        &self,
        path: &Path,
        hint: Option<&Path>,
    ) -> Result<Option<CompilationCommand>> {
        for log in self.log_files(hint) {
            match self.scan_log(&log, path) {
                Ok(Some(command)) => {
                    debug!(log = %log.display(), path = %path.display(), "compile command scraped");
                    return Ok(Some(command));
                }
                Ok(None) => continue,
                Err(ResolveError::Io(err)) => {
                    // A log rotated away mid-scan is not fatal; keep going.
                    debug!(log = %log.display(), %err, "skipping unreadable log");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        "build-log scraper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_log(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_scrapes_latest_compile_line() {
        let dir = tempdir().unwrap();
        write_log(
            dir.path(),
            "build1.log",
            "cd /work/app\n\
             /usr/bin/cc -c /work/app/src/foo.c -O1 -o /work/out/foo.o\n\
             /usr/bin/cc -c /work/app/src/foo.c -O2 -o /work/out/foo.o\n",
        );
        let scraper = BuildLogScraper::single_dir(dir.path());
        let command = scraper
            .lookup(Path::new("/work/app/src/foo.c"))
            .unwrap()
            .unwrap();
        assert_eq!(command.program, PathBuf::from("/usr/bin/cc"));
        assert!(command.args.contains(&"-O2".to_string()));
        assert_eq!(command.workdir, Some(PathBuf::from("/work/app")));
        assert_eq!(command.outputs, vec![PathBuf::from("/work/out/foo.o")]);
    }

    #[test]
    fn test_miss_returns_none() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), "build1.log", "/usr/bin/cc -c /other/file.c\n");
        let scraper = BuildLogScraper::single_dir(dir.path());
        assert!(scraper
            .lookup(Path::new("/work/app/src/foo.c"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_quoted_paths_survive_scraping() {
        let dir = tempdir().unwrap();
        write_log(
            dir.path(),
            "build1.log",
            "/usr/bin/cc -c \"/My Project/src/foo.c\" -o \"/My Project/out/foo.o\"\n",
        );
        let scraper = BuildLogScraper::single_dir(dir.path());
        let command = scraper
            .lookup(Path::new("/My Project/src/foo.c"))
            .unwrap()
            .unwrap();
        assert!(command.args.iter().any(|a| a == "/My Project/src/foo.c"));
    }

    #[test]
    fn test_filelist_expanded_from_output_file_map() {
        let dir = tempdir().unwrap();
        let map = dir.path().join("unit.json");
        fs::write(
            &map,
            r#"{"/work/src/a.c": {"object": "a.o"}, "/work/src/b.c": {"object": "b.o"}}"#,
        )
        .unwrap();
        write_log(
            dir.path(),
            "build1.log",
            &format!(
                "/usr/bin/cc -c /work/src/a.c -filelist /tmp/list.txt -output-file-map {} -o /work/a.o\n",
                map.display()
            ),
        );
        let scraper = BuildLogScraper::single_dir(dir.path());
        let command = scraper.lookup(Path::new("/work/src/a.c")).unwrap().unwrap();
        assert!(!command.args.contains(&"-filelist".to_string()));
        assert!(command.inputs.contains(&PathBuf::from("/work/src/a.c")));
        assert!(command.inputs.contains(&PathBuf::from("/work/src/b.c")));
    }

    #[test]
    fn test_newer_log_wins() {
        let dir = tempdir().unwrap();
        let old = write_log(
            dir.path(),
            "old.log",
            "/usr/bin/cc -c /work/src/foo.c -DOLD -o foo.o\n",
        );
        // Ensure distinct mtimes.
        let past = filetime_backdate(&old);
        assert!(past);
        write_log(
            dir.path(),
            "new.log",
            "/usr/bin/cc -c /work/src/foo.c -DNEW -o foo.o\n",
        );
        let scraper = BuildLogScraper::single_dir(dir.path());
        let command = scraper.lookup(Path::new("/work/src/foo.c")).unwrap().unwrap();
        assert!(command.args.contains(&"-DNEW".to_string()));
    }

    #[test]
    fn test_ide_hint_prefers_matching_log_directory() {
        let dir = tempdir().unwrap();
        let xcode_logs = dir.path().join("xcode-logs");
        let vscode_logs = dir.path().join("vscode-logs");
        fs::create_dir_all(&xcode_logs).unwrap();
        fs::create_dir_all(&vscode_logs).unwrap();

        let older = write_log(
            &xcode_logs,
            "build1.log",
            "/usr/bin/cc -c /work/src/foo.c -DXCODE -o foo.o\n",
        );
        assert!(filetime_backdate(&older));
        write_log(
            &vscode_logs,
            "build1.log",
            "/usr/bin/cc -c /work/src/foo.c -DVSCODE -o foo.o\n",
        );

        let scraper = BuildLogScraper::new(vec![vscode_logs, xcode_logs]);

        // No hint: the newest log wins regardless of directory.
        let plain = scraper.lookup(Path::new("/work/src/foo.c")).unwrap().unwrap();
        assert!(plain.args.contains(&"-DVSCODE".to_string()));

        // Hinted: the directory naming the IDE process is searched first,
        // even though its log is older.
        let hinted = scraper
            .lookup_with_hint(
                Path::new("/work/src/foo.c"),
                Some(Path::new("/Applications/Xcode.app/Contents/MacOS/Xcode")),
            )
            .unwrap()
            .unwrap();
        assert!(hinted.args.contains(&"-DXCODE".to_string()));
    }

    /// Push a file's mtime into the past without extra dev-dependencies.
    fn filetime_backdate(path: &Path) -> bool {
        let file = fs::OpenOptions::new().write(true).open(path).is_ok();
        // mtime granularity can be coarse; a short sleep separates writes.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        file
    }
}
