//! DualCopy CLI - resumable instructor/public folder replication

use anyhow::{Context, Result};
use clap::Parser;
use dualcopy::config::{CliArgs, Commands, ReplicationConfig};
use dualcopy::core::{Replication, RunOutcome};
use dualcopy::progress::ProgressReporter;
use dualcopy::store::MemoryStore;
use dualcopy::sync::{CheckpointManager, FileStateStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    setup_logging(&args);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(args: &CliArgs) {
    let filter = match args.verbose {
        0 if args.quiet => EnvFilter::new("dualcopy=error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dualcopy=warn")),
        1 => EnvFilter::new("dualcopy=info"),
        2 => EnvFilter::new("dualcopy=debug"),
        _ => EnvFilter::new("dualcopy=trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let state = Arc::new(FileStateStore::new(&args.state));

    match &args.command {
        Commands::Status => {
            match CheckpointManager::new(state).load().context("Reading checkpoint")? {
                Some(checkpoint) => println!("Suspended: {}", checkpoint),
                None => println!("No replication in progress"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear => {
            CheckpointManager::new(state).clear().context("Clearing checkpoint")?;
            println!("Checkpoint cleared");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tree { id } => {
            let store = load_store(&args)?;
            print!("{}", store.render_tree(id)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Start { source, parent, name } => {
            let config = ReplicationConfig::from_cli(&args.run).context("Invalid configuration")?;
            let workers = config.workers;
            replicate(&args, state, config, |replication| {
                replication.start(source, parent, name, workers)
            })
        }
        Commands::Resume => {
            let config = ReplicationConfig::from_cli(&args.run).context("Invalid configuration")?;
            replicate(&args, state, config, Replication::resume)
        }
    }
}

/// Run `action` against the snapshot, then write the snapshot back
fn replicate<F>(
    args: &CliArgs,
    state: Arc<FileStateStore>,
    config: ReplicationConfig,
    action: F,
) -> Result<ExitCode>
where
    F: FnOnce(&Replication) -> RunOutcome,
{
    let store = Arc::new(load_store(args)?);
    let progress = Arc::new(if args.quiet {
        ProgressReporter::disabled()
    } else {
        ProgressReporter::new()
    });

    let replication = Replication::new(store.clone(), state, config).with_progress(progress);
    let outcome = action(&replication);

    store
        .save(&args.store)
        .with_context(|| format!("Writing store snapshot {}", args.store.display()))?;

    if let Some(summary) = outcome.summary() {
        if !args.quiet {
            summary.print_summary();
        }
    }

    Ok(match outcome {
        RunOutcome::Completed(_) => ExitCode::SUCCESS,
        RunOutcome::Suspended { checkpoint, .. } => {
            println!("Suspended after {} folders; run `dualcopy resume` to continue", checkpoint.processed_count);
            ExitCode::from(3)
        }
        RunOutcome::NothingToResume => {
            println!("Nothing to resume");
            ExitCode::SUCCESS
        }
        RunOutcome::Aborted(reason) => {
            eprintln!("Replication aborted: {}", reason);
            ExitCode::FAILURE
        }
    })
}

fn load_store(args: &CliArgs) -> Result<MemoryStore> {
    MemoryStore::load(&args.store).with_context(|| format!("Loading store snapshot {}", args.store.display()))
}
