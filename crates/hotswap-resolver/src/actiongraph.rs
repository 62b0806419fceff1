//! Compile-command recovery from an exported build action graph
//!
//! Modern build systems can export the full action graph as JSON: one
//! record per planned tool invocation with its argument vector, inputs,
//! outputs and working directory. Querying that export is both faster
//! and more precise than log scraping, but the export has to exist; the
//! resolver falls back to the scraper when it does not.

use crate::{CommandSource, Result};
use hotswap_command::CompilationCommand;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ActionGraph {
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct Action {
    tool: PathBuf,
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    inputs: Vec<PathBuf>,
    #[serde(default)]
    outputs: Vec<PathBuf>,
    #[serde(rename = "workingDirectory")]
    working_directory: Option<PathBuf>,
    #[serde(default)]
    environment: Vec<(String, String)>,
}

/// Looks up compile commands in an exported action-graph JSON file.
///
/// The export is parsed lazily on first lookup and kept for the life of
/// the query object; re-exports require constructing a fresh one.
pub struct ActionGraphQuery {
    export_path: PathBuf,
    graph: std::sync::OnceLock<ActionGraph>,
}

impl ActionGraphQuery {
    pub fn new(export_path: impl Into<PathBuf>) -> Self {
        Self {
            export_path: export_path.into(),
            graph: std::sync::OnceLock::new(),
        }
    }

    fn graph(&self) -> Result<&ActionGraph> {
        if let Some(graph) = self.graph.get() {
            return Ok(graph);
        }
        let text = std::fs::read_to_string(&self.export_path)?;
        let parsed: ActionGraph = serde_json::from_str(&text)?;
        Ok(self.graph.get_or_init(|| parsed))
    }
}

impl CommandSource for ActionGraphQuery {
    fn lookup(&self, path: &Path) -> Result<Option<CompilationCommand>> {
        let graph = self.graph()?;
        // Prefer the action that names the path as an input over one
        // that merely mentions it in its arguments.
        let action = graph
            .actions
            .iter()
            .find(|a| a.inputs.iter().any(|i| i == path))
            .or_else(|| {
                graph
                    .actions
                    .iter()
                    .find(|a| a.arguments.iter().any(|arg| Path::new(arg) == path))
            });
        let Some(action) = action else {
            return Ok(None);
        };
        debug!(tool = %action.tool.display(), path = %path.display(), "action graph hit");

        let mut inputs = action.inputs.clone();
        if inputs.is_empty() {
            inputs.push(path.to_path_buf());
        }
        let mut command =
            CompilationCommand::new(action.tool.clone(), action.arguments.clone()).with_inputs(inputs);
        command.outputs = action.outputs.clone();
        command.workdir = action.working_directory.clone();
        command.env = action.environment.clone();
        Ok(Some(command))
    }

    fn name(&self) -> &str {
        "action-graph query"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const EXPORT: &str = r#"{
        "actions": [
            {
                "tool": "/usr/bin/cc",
                "arguments": ["-c", "/work/src/a.c", "-O2", "-o", "/work/out/a.o"],
                "inputs": ["/work/src/a.c"],
                "outputs": ["/work/out/a.o"],
                "workingDirectory": "/work"
            },
            {
                "tool": "/usr/bin/ld",
                "arguments": ["/work/out/a.o", "-o", "/work/out/app"],
                "inputs": ["/work/out/a.o"],
                "outputs": ["/work/out/app"]
            }
        ]
    }"#;

    #[test]
    fn test_finds_action_by_input() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("graph.json");
        fs::write(&export, EXPORT).unwrap();

        let query = ActionGraphQuery::new(&export);
        let command = query.lookup(Path::new("/work/src/a.c")).unwrap().unwrap();
        assert_eq!(command.program, PathBuf::from("/usr/bin/cc"));
        assert_eq!(command.workdir, Some(PathBuf::from("/work")));
        assert_eq!(command.outputs, vec![PathBuf::from("/work/out/a.o")]);
    }

    #[test]
    fn test_unknown_path_is_a_miss() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("graph.json");
        fs::write(&export, EXPORT).unwrap();

        let query = ActionGraphQuery::new(&export);
        assert!(query.lookup(Path::new("/work/src/b.c")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_export_is_an_error() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("graph.json");
        fs::write(&export, "not json").unwrap();

        let query = ActionGraphQuery::new(&export);
        assert!(query.lookup(Path::new("/work/src/a.c")).is_err());
    }
}
