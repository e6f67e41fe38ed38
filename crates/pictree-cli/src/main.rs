//! Pictree — a photo folder organizer for the command line.
//!
//! Thin frontend over `pictree-core`: every subcommand builds an [`App`]
//! context, points it at a root folder, and renders the result.

use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use pictree_core::{
    App, CancelFlag, ChangeEvent, DirectoryTree, JsonStore, MemoryStore, NodeId, ScanPhase,
    ScanProgress, Settings, ShellTrash, Store,
};

#[derive(Parser)]
#[command(name = "pictree")]
#[command(about = "Browse photo folders, watch them for changes, and find duplicate images")]
#[command(version)]
struct Cli {
    /// Settings file (TOML); defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the directory tree of a photo folder
    Tree {
        /// Root folder to inspect
        root: PathBuf,

        /// Maximum tree depth
        #[arg(short, long, default_value = "3")]
        depth: usize,

        /// Emit the tree as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Find duplicate images under a folder
    Dupes {
        /// Root folder to scan
        root: PathBuf,

        /// Only scan the folder's direct children
        #[arg(long)]
        direct: bool,

        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Count the images under a folder
    Count {
        /// Root folder to count
        root: PathBuf,

        /// Only count the folder's direct children
        #[arg(long)]
        direct: bool,
    },

    /// Watch a folder and print change events until interrupted
    Watch {
        /// Root folder to watch
        root: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let mut app = App::new(settings, open_store(), Box::new(ShellTrash));

    match cli.command {
        Commands::Tree { root, depth, json } => {
            unwrap_response(app.set_root(&root))?;
            let tree = unwrap_response(app.get_tree(None, depth))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print_tree(&tree, tree.root_id(), 0);
            }
        }
        Commands::Dupes { root, direct, json } => {
            unwrap_response(app.set_root(&root))?;
            let report = unwrap_response(app.scan_duplicates(
                None,
                !direct,
                &CancelFlag::new(),
                print_progress,
            ))?;
            eprintln!();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.groups.is_empty() {
                println!("no duplicates found");
            } else {
                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        "group {} ({} copies, {} bytes each, {}):",
                        i + 1,
                        group.files.len(),
                        group.size,
                        group.hash
                    );
                    for file in &group.files {
                        println!("  {}", file.display());
                    }
                }
                println!(
                    "{} redundant copies wasting {} bytes",
                    report.redundant_copies, report.wasted_bytes
                );
            }
        }
        Commands::Count { root, direct } => {
            unwrap_response(app.set_root(&root))?;
            let count = unwrap_response(app.image_count(None, !direct))?;
            println!("{count}");
        }
        Commands::Watch { root } => {
            app.service_mut().set_root(&root)?;
            app.service_mut().start_watching()?;
            if !app.service().is_watching() {
                bail!("watching is disabled in configuration (watch_enabled = false)");
            }
            let mut events = app.service().subscribe();
            println!("watching {} (ctrl-c to stop)", root.display());
            loop {
                use tokio::sync::broadcast::error::RecvError;
                match events.blocking_recv() {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("{missed} change events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

/// Opens the persistent store under the user's config directory, or an
/// in-memory one when no home directory is available.
fn open_store() -> Box<dyn Store> {
    match std::env::var_os("HOME") {
        Some(home) => Box::new(JsonStore::open(
            &PathBuf::from(home).join(".config/pictree/state.json"),
        )),
        None => Box::new(MemoryStore::new()),
    }
}

fn unwrap_response<T>(response: pictree_core::ApiResponse<T>) -> anyhow::Result<T> {
    match response.data {
        Some(data) if response.success => Ok(data),
        _ => Err(anyhow!(response
            .error
            .unwrap_or_else(|| "operation failed".to_string()))),
    }
}

fn print_tree(tree: &DirectoryTree, id: NodeId, indent: usize) {
    let node = tree.node(id);
    let pad = "  ".repeat(indent);
    if node.is_dir {
        let suffix = if node.is_loaded { "" } else { " …" };
        println!("{pad}{}/ ({} images){suffix}", node.name, node.image_count);
    } else {
        println!("{pad}{}", node.name);
    }
    for &child in &node.children {
        print_tree(tree, child, indent + 1);
    }
}

fn print_progress(progress: ScanProgress) {
    let phase = match progress.phase {
        ScanPhase::Quick => "quick",
        ScanPhase::Confirm => "confirm",
    };
    eprint!("\r{phase} {}/{}        ", progress.index, progress.total);
}

fn print_event(event: &ChangeEvent) {
    match event {
        ChangeEvent::FileAdded(path) => println!("+ {}", path.display()),
        ChangeEvent::FileRemoved(path) => println!("- {}", path.display()),
        ChangeEvent::FileChanged(path) => println!("~ {}", path.display()),
        ChangeEvent::DirectoryAdded(path) => println!("+ {}/", path.display()),
        ChangeEvent::DirectoryRemoved(path) => println!("- {}/", path.display()),
        ChangeEvent::WatcherError(message) => eprintln!("watcher error: {message}"),
    }
}
