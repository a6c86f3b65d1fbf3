// ============================================================
// Layer 5 — Fit Loop
// ============================================================
// Drives any EpochRunner through n_epochs of train → validate:
//
//   idle → (training → validating) × n_epochs → finished
//
// After every validation pass:
//   - val_loss < best (best starts at +∞) → save the checkpoint.
//     Ties never overwrite, so the first epoch reaching a loss wins.
//   - logging enabled → upload the epoch's record.
//
// On every exit path (success, error, interruption) the logger, when
// present, receives log_model(checkpoint) if one was written and then
// finish(status): Finished on success, Failed otherwise. The original
// error is returned after that.
//
// Reference: Burn Book §5 (Custom training loops)

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::domain::error::Split;
use crate::domain::traits::{EpochRunner, EpochSummary, ExperimentLogger, LogRecord, RunStatus};

/// What a finished (or aborted) fit reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Lowest validation loss seen; +∞ if no epoch validated
    pub best_val_loss:    f64,
    pub best_epoch:       Option<usize>,
    pub epochs_completed: usize,
    /// The file the best checkpoint was written to
    pub checkpoint:       Option<PathBuf>,
    pub elapsed:          Duration,
}

impl FitReport {
    fn new() -> Self {
        Self {
            best_val_loss:    f64::INFINITY,
            best_epoch:       None,
            epochs_completed: 0,
            checkpoint:       None,
            elapsed:          Duration::ZERO,
        }
    }
}

/// Run the full train/validate schedule.
pub fn fit_loop<R>(
    runner:     &mut R,
    n_epochs:   usize,
    model_path: &Path,
    logger:     Option<&mut dyn ExperimentLogger>,
) -> Result<FitReport>
where
    R: EpochRunner + ?Sized,
{
    let start = Instant::now();
    let mut logger = logger;
    let mut report = FitReport::new();

    let outcome = run_epochs(runner, n_epochs, model_path, &mut logger, &mut report);

    let status = if outcome.is_ok() { RunStatus::Finished } else { RunStatus::Failed };
    let closed = match logger {
        Some(logger) => close_session(logger, report.checkpoint.as_deref(), status),
        None => Ok(()),
    };

    report.elapsed = start.elapsed();
    let secs = report.elapsed.as_secs();
    tracing::info!("Training complete in {}m {}s", secs / 60, secs % 60);

    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            tracing::warn!("Closing the logging session failed: {close_err:#}");
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(report),
    }
}

fn run_epochs<R>(
    runner:     &mut R,
    n_epochs:   usize,
    model_path: &Path,
    logger:     &mut Option<&mut dyn ExperimentLogger>,
    report:     &mut FitReport,
) -> Result<()>
where
    R: EpochRunner + ?Sized,
{
    for epoch in 1..=n_epochs {
        let train = runner.train_epoch(epoch)?;
        if let Some(logger) = logger.as_mut() {
            logger.add(tagged(Split::Train, &train))?;
        }

        let val = runner.val_epoch(epoch)?;
        if let Some(logger) = logger.as_mut() {
            logger.add(tagged(Split::Val, &val))?;
        }

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4}",
            epoch, n_epochs, train.loss, val.loss
        );

        if val.loss < report.best_val_loss {
            let written = runner.save_checkpoint(model_path)?;
            tracing::info!(
                "val_loss improved {:.4} → {:.4}, checkpoint saved to '{}'",
                report.best_val_loss, val.loss, written.display()
            );
            report.best_val_loss = val.loss;
            report.best_epoch    = Some(epoch);
            report.checkpoint    = Some(written);
        }

        if let Some(logger) = logger.as_mut() {
            logger.upload()?;
        }
        report.epochs_completed = epoch;
    }
    Ok(())
}

fn tagged(split: Split, summary: &EpochSummary) -> LogRecord {
    LogRecord::from([(split.as_str().to_string(), summary.metrics.clone())])
}

fn close_session(logger: &mut dyn ExperimentLogger, checkpoint: Option<&Path>, status: RunStatus) -> Result<()> {
    let logged = match checkpoint {
        Some(path) => logger.log_model(path),
        None => Ok(()),
    };
    let finished = logger.finish(status);
    logged.and(finished)
}
