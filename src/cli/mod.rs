// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `train`      — trains from a config file
//   2. `sweep`      — trains from the sweep environment
//   3. `evaluate`   — validates the best checkpoint of a config
//   4. `components` — lists the names a config may use
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, EvaluateArgs};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::application::train_use_case::{TrainOptions, TrainUseCase};

#[derive(Parser, Debug)]
#[command(
    name = "epoch-trainer",
    version,
    about = "Config-driven epoch training of burn models, with experiment logging and best-checkpoint tracking."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args.into()),
            Commands::Sweep(args)    => run_train(args.into()),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Components     => run_components(),
        }
    }
}

fn run_train(options: TrainOptions) -> Result<()> {
    let shutdown = install_shutdown_handler()?;
    let report = TrainUseCase::new(options, shutdown).execute()?;

    match (report.best_epoch, &report.checkpoint) {
        (Some(epoch), Some(path)) => println!(
            "Best val_loss {:.4} at epoch {} saved to {}",
            report.best_val_loss, epoch, path.display()
        ),
        _ => println!("No checkpoint saved: validation loss never became finite."),
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let summary = EvaluateUseCase::new(args.config).execute()?;
    for (name, value) in &summary.metrics {
        println!("{name:>16}: {value:.4}");
    }
    Ok(())
}

fn run_components() -> Result<()> {
    use crate::application::catalog::component_catalog;

    for entry in component_catalog() {
        println!("{:<10} {:<8} {}", entry.kind.as_str(), format!("{:?}", entry.origin).to_lowercase(), entry.names.join(", "));
    }
    Ok(())
}

/// Ctrl-C sets the flag; the trainer stops before its next batch.
fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let flag    = Arc::new(AtomicBool::new(false));
    let handler = flag.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, stopping after the current batch");
        handler.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(flag)
}
