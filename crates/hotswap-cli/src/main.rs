//! hotswap CLI - watch sources, rebuild changed files into reloadable modules

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use clap::{Parser, Subcommand};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::debug;
use walkdir::WalkDir;

use hotswap_builder::{BuildConfig, ModuleBuilder};
use hotswap_command::{ChangeBatch, ChangeKind, Fingerprint, GenerationCounter, SourceChange};
use hotswap_engine::{CompileQueue, Compiler};
use hotswap_resolver::{
    ActionGraphQuery, BuildLogScraper, CacheStore, CommandResolver, CommandSource,
    RedbCommandCache,
};

/// Directory names whose contents are build output, never sources.
const IGNORED_DIRS: &[&str] = &["target", "build", ".build", ".git", "DerivedData"];

/// How long to keep collecting changes before submitting a batch.
const BATCH_WINDOW: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "hotswap")]
#[command(about = "Rebuild changed source files into dynamically loadable modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct SourceOpts {
    /// Directories containing the build's textual logs
    #[arg(long)]
    logs: Vec<PathBuf>,
    /// Exported action-graph JSON; preferred over log scraping when given
    #[arg(long)]
    action_graph: Option<PathBuf>,
    /// Persistent command cache file
    #[arg(long)]
    cache: Option<PathBuf>,
    /// Directory for build artifacts
    #[arg(long, default_value = "/tmp/hotswap")]
    tmp: PathBuf,
    /// Toolchain identity folded into the workspace fingerprint
    #[arg(long, default_value = "cc")]
    toolchain: String,
    /// Path of the IDE process whose build configuration to prefer when
    /// several write logs for the same tree
    #[arg(long)]
    ide_hint: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a source tree and rebuild files as they change
    Watch {
        /// Workspace root to watch
        root: PathBuf,
        /// Source extensions to react to
        #[arg(long, value_delimiter = ',', default_value = "c,cc,cpp,cxx,m,mm,swift,rs")]
        ext: Vec<String>,
        #[command(flatten)]
        source: SourceOpts,
    },
    /// Rebuild a single file once
    Reload {
        /// Changed source file
        file: PathBuf,
        /// Workspace root (defaults to the file's directory)
        #[arg(long)]
        root: Option<PathBuf>,
        #[command(flatten)]
        source: SourceOpts,
    },
    /// Inspect or clear the persistent command cache
    Cache {
        /// Cache file
        cache: PathBuf,
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Print the workspace fingerprint cached commands are keyed by
    Fingerprint {
        /// Workspace root
        root: PathBuf,
        /// Toolchain identity
        #[arg(long, default_value = "cc")]
        toolchain: String,
        /// Build configuration file whose mtime feeds the digest
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached source paths
    Show,
    /// Drop every cached command
    Clear,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Watch { root, ext, source } => cmd_watch(&root, &ext, &source),
        Commands::Reload { file, root, source } => cmd_reload(&file, root.as_deref(), &source),
        Commands::Cache { cache, command } => cmd_cache(&cache, command),
        Commands::Fingerprint {
            root,
            toolchain,
            config,
        } => {
            let fingerprint = Fingerprint::compute(&root, &toolchain, config.as_deref());
            println!("{fingerprint}");
        }
    }
}

fn make_compiler(root: &Path, opts: &SourceOpts) -> Compiler {
    let source: Box<dyn CommandSource> = match &opts.action_graph {
        Some(export) => Box::new(ActionGraphQuery::new(export)),
        None => {
            let dirs = if opts.logs.is_empty() {
                vec![root.join(".build").join("logs")]
            } else {
                opts.logs.clone()
            };
            Box::new(BuildLogScraper::new(dirs))
        }
    };

    let fingerprint = Fingerprint::compute(root, &opts.toolchain, None);
    let mut resolver = CommandResolver::new(source, fingerprint);
    if let Some(cache) = &opts.cache {
        match RedbCommandCache::new(cache) {
            Ok(disk) => resolver = resolver.with_disk_cache(Box::new(disk)),
            Err(e) => {
                eprintln!("Error opening cache {}: {}", cache.display(), e);
                std::process::exit(1);
            }
        }
    }

    let builder = ModuleBuilder::new(BuildConfig::new(&opts.tmp));
    Compiler::new(resolver, builder, GenerationCounter::new())
}

fn cmd_reload(file: &Path, root: Option<&Path>, opts: &SourceOpts) {
    let root = root
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let compiler = make_compiler(&root, opts);

    match compiler.compile_with_hint(file, opts.ide_hint.as_deref()) {
        Ok(built) => {
            eprintln!(
                "Built generation {} for {}",
                built.generation,
                file.display()
            );
            println!("{}", built.module.display());
        }
        Err(e) => {
            eprintln!("Error building {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_watch(root: &Path, extensions: &[String], opts: &SourceOpts) {
    let watched = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
        .count();
    eprintln!("Watching {} source files under {}", watched, root.display());

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error creating watcher: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
        eprintln!("Error watching {}: {}", root.display(), e);
        std::process::exit(1);
    }

    let queue = match CompileQueue::spawn(make_compiler(root, opts)) {
        Ok(queue) => queue,
        Err(e) => {
            eprintln!("Error starting compile worker: {}", e);
            std::process::exit(1);
        }
    };

    let mut pending: Vec<SourceChange> = Vec::new();
    loop {
        // Collect changes until the tree goes quiet for one window, then
        // submit everything as a single batch. The idle timeout stays
        // short so finished compiles get reported promptly.
        let timeout = if pending.is_empty() {
            Duration::from_millis(500)
        } else {
            BATCH_WINDOW
        };
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                collect_changes(&event, extensions, &mut pending);
            }
            Ok(Err(e)) => {
                debug!("watch error: {e}");
            }
            Err(RecvTimeoutError::Timeout) => {
                if !pending.is_empty() {
                    let batch = ChangeBatch {
                        changes: std::mem::take(&mut pending),
                        ide_hint: opts.ide_hint.clone(),
                    };
                    if queue.submit(batch).is_err() {
                        eprintln!("Compile worker stopped; exiting");
                        std::process::exit(1);
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while let Some(outcome) = queue.try_next() {
            report_outcome(&outcome);
        }
    }
}

fn collect_changes(event: &Event, extensions: &[String], pending: &mut Vec<SourceChange>) {
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Modify(_) => ChangeKind::Modified,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => return,
    };
    for path in &event.paths {
        if is_ignored(path) || !has_extension(path, extensions) {
            continue;
        }
        // newest change per path wins
        pending.retain(|c| &c.path != path);
        pending.push(SourceChange {
            path: path.clone(),
            kind,
        });
    }
}

fn report_outcome(outcome: &hotswap_engine::CompileOutcome) {
    match &outcome.result {
        Ok(built) => {
            eprintln!(
                "Built generation {} for {} -> {}",
                built.generation,
                outcome.path.display(),
                built.module.display()
            );
        }
        Err(e) => {
            eprintln!("Error building {}: {}", outcome.path.display(), e);
        }
    }
}

fn cmd_cache(cache: &Path, command: CacheCommands) {
    let store = match RedbCommandCache::new(cache) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening cache {}: {}", cache.display(), e);
            std::process::exit(1);
        }
    };
    match command {
        CacheCommands::Show => match store.paths() {
            Ok(paths) => {
                for path in &paths {
                    println!("{}", path.display());
                }
                eprintln!("{} cached command(s)", paths.len());
            }
            Err(e) => {
                eprintln!("Error reading cache: {}", e);
                std::process::exit(1);
            }
        },
        CacheCommands::Clear => match store.clear() {
            Ok(()) => eprintln!("Cache cleared"),
            Err(e) => {
                eprintln!("Error clearing cache: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
    })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want == ext))
}
