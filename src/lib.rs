// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod state;
pub mod task;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, registry_from_config};
use crate::dag::Registry;
use crate::engine::{execute, AutoConfirm, BlockingGate, ConfirmationGate, PromptGate, RunOutcome};
use crate::state::{compute_run_set, StateStore};

pub use crate::task::Task;
pub use crate::types::{output, Output, OutputValue, TaskName};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and task registration
/// - state loading
/// - invalidation + confirmation
/// - the runtime loop
/// - persisting the updated state
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let root_dir = config_root_dir(&config_path);
    let registry = registry_from_config(&cfg, &root_dir)?;

    let state_path = match args.state {
        Some(ref p) => PathBuf::from(p),
        None => root_dir.join(&cfg.config.state_file),
    };
    debug!(path = %state_path.display(), "using state file");

    let store = if args.strict_state {
        StateStore::load_strict(&state_path)?
    } else {
        StateStore::load(&state_path)
    };

    if args.dry_run {
        print_dry_run(&registry, store).await;
        return Ok(());
    }

    let mut gate: Box<dyn ConfirmationGate> = if args.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(BlockingGate::new(PromptGate::new(
            std::io::stdin().lock(),
            std::io::stdout(),
        )))
    };

    let outcome = execute(&registry, store, gate.as_mut(), cfg.config.runtime_options()).await?;

    match outcome {
        RunOutcome::NothingToRun => {
            println!("all {} tasks up to date; nothing to run", registry.len());
        }
        RunOutcome::Aborted { run_set } => {
            println!("aborted; {} task(s) not run, state unchanged", run_set.len());
        }
        RunOutcome::Finished { report, store } => {
            store.persist(&state_path).with_context(|| {
                format!(
                    "run finished but state could not be saved to {}; the next run will start from stale state",
                    state_path.display()
                )
            })?;
            println!("{report}");
            info!(success = report.is_success(), "cachedag run complete");
        }
    }

    Ok(())
}

/// Figure out the project root: the config file's parent directory, or the
/// current working directory for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print tasks, deps and which would run. Does not execute anything.
async fn print_dry_run(registry: &Registry, mut store: StateStore) {
    store.reconcile(registry);
    let run_set = compute_run_set(registry, &store).await;

    println!("cachedag dry-run");
    println!("tasks ({}):", registry.len());
    for name in registry.graph().topological_order() {
        let marker = if run_set.contains(&name) { "run" } else { "up to date" };
        println!("  - {name} [{marker}]");
        let deps = registry.graph().direct_dependencies_of(&name);
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
    }

    debug!("dry-run complete (no execution)");
}
