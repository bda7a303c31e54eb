//! Specdeck - project tree and task progress CLI.
//!
//! A thin rendering layer over the engine, mostly useful for inspecting
//! what a desktop frontend would see.
//!
//! # Commands
//!
//! - `specdeck tree <path>`: load a project and print its trees
//! - `specdeck watch <path>`: load a project and keep printing as the
//!   filesystem changes, until Ctrl-C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use specdeck_engine::config::EngineConfig;
use specdeck_engine::local_fs::LocalFs;
use specdeck_engine::session::SessionSnapshot;
use specdeck_engine::tabs::TabManager;
use specdeck_engine::types::TreeNode;

/// How often the watch command re-renders while flags indicate activity.
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a load may keep its flags up before printing anyway.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Specdeck - OpenSpec project workbench.
///
/// Loads a project directory, derives task progress from checklists, and
/// keeps the view synchronized with the filesystem.
#[derive(Parser, Debug)]
#[command(name = "specdeck")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    SPECDECK_INITIAL_DEPTH       Depth of the fast first-paint load (default: 2)
    SPECDECK_FULL_LOAD_DELAY_MS  Delay before the full background load (default: 800)
    SPECDECK_RELOAD_DEBOUNCE_MS  Debounce for change-triggered reloads (default: 300)
    SPECDECK_WORKER_POOL_SIZE    Concurrent checklist readers (default: 4)
    SPECDECK_MAX_TABS            Tab cap (default: 5)

EXAMPLES:
    # Print a project's trees with progress badges
    specdeck tree ~/work/my-project

    # Keep the view updated as files change
    specdeck watch ~/work/my-project --other
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load a project once and print its trees.
    Tree {
        /// Project directory.
        path: String,

        /// Include files outside the changes/specs categories.
        #[arg(long)]
        other: bool,
    },

    /// Load a project and re-print on filesystem changes until Ctrl-C.
    Watch {
        /// Project directory.
        path: String,

        /// Include files outside the changes/specs categories.
        #[arg(long)]
        other: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid SPECDECK_* configuration")?;
    // The full background load only starts after this delay; wait at
    // least that long (plus a settle margin) before printing.
    let warmup = config.full_load_delay + Duration::from_millis(400);
    let manager = TabManager::new(Arc::new(LocalFs::new()), config);

    match cli.command {
        Command::Tree { path, other } => run_tree(&manager, &path, other, warmup).await,
        Command::Watch { path, other } => run_watch(&manager, &path, other, warmup).await,
    }
}

async fn run_tree(manager: &TabManager, path: &str, other: bool, warmup: Duration) -> Result<()> {
    let id = open(manager, path, other).await?;
    let session = manager.session(id).await?;

    let snapshot = settle(&session, warmup).await;
    print_snapshot(&snapshot);

    manager.close_tab(id).await?;
    Ok(())
}

async fn run_watch(manager: &TabManager, path: &str, other: bool, warmup: Duration) -> Result<()> {
    let id = open(manager, path, other).await?;
    let session = manager.session(id).await?;

    let snapshot = settle(&session, warmup).await;
    print_snapshot(&snapshot);
    info!("Watching for changes, Ctrl-C to stop");

    let mut last = serde_json::to_string(&snapshot)?;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            _ = tokio::time::sleep(SETTLE_POLL_INTERVAL) => {
                let snapshot = session.snapshot().await;
                if snapshot.is_loading || snapshot.is_background_loading {
                    continue;
                }
                let current = serde_json::to_string(&snapshot)?;
                if current != last {
                    last = current;
                    print_snapshot(&snapshot);
                }
            }
        }
    }

    manager.close_tab(id).await?;
    Ok(())
}

async fn open(manager: &TabManager, path: &str, other: bool) -> Result<u64> {
    let id = manager.open_project(path).await?;
    let session = manager.session(id).await?;
    if other {
        session.set_other_files_visible(true).await;
    }
    Ok(id)
}

/// Waits for the shallow load, the delayed full load, and the progress
/// backfill to quiesce.
async fn settle(session: &specdeck_engine::session::Session, warmup: Duration) -> SessionSnapshot {
    let started = tokio::time::Instant::now();
    let deadline = started + SETTLE_TIMEOUT;
    loop {
        tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        let snapshot = session.snapshot().await;
        let now = tokio::time::Instant::now();
        let busy = snapshot.is_loading || snapshot.is_background_loading;
        if (now >= started + warmup && !busy) || now >= deadline {
            return snapshot;
        }
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    if let Some(error) = &snapshot.error {
        println!("error: {error}");
    }
    println!("{} ({})", snapshot.project_name, snapshot.project_path);
    print_category("changes", &snapshot.changes);
    print_category("specs", &snapshot.specs);
    if !snapshot.other.is_empty() {
        print_category("other", &snapshot.other);
    }
}

fn print_category(label: &str, nodes: &[TreeNode]) {
    println!("{label}:");
    if nodes.is_empty() {
        println!("  (empty)");
        return;
    }
    for node in nodes {
        print_node(node, 1);
    }
}

fn print_node(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{indent}{}", node.name);
    if let Some(progress) = node.progress {
        line.push_str(&format!(" [{}/{}]", progress.completed, progress.total));
    }
    if node.is_archived {
        line.push_str(" (archived)");
    }
    if node.is_folder() && !node.children_loaded {
        line.push_str(" …");
    }
    println!("{line}");
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
