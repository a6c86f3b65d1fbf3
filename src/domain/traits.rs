// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The two seams of the training loop:
//
//   EpochRunner      — something that can run one training pass,
//                      one validation pass, and persist its model.
//                      The burn-backed Trainer implements it; tests
//                      use scripted runners with fixed loss sequences.
//
//   ExperimentLogger — an experiment-tracking session. It owns the
//                      effective configuration (a sweep may override
//                      it), buffers one record per epoch, uploads it,
//                      and stores the best checkpoint as an artifact.
//
// The fit loop in ml::fit only ever sees these traits.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::config::ExperimentConfig;

/// Metric name → cumulative value, e.g. `{"accuracy": 0.91, "loss": 0.27}`.
pub type MetricSnapshot = BTreeMap<String, f64>;

/// One tagged entry of an epoch record, e.g. `{"train": {...}}`.
pub type LogRecord = BTreeMap<String, MetricSnapshot>;

/// What one pass over a split produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// Sample-weighted mean loss over the whole pass
    pub loss: f64,

    /// Final metric snapshot, including `loss` (and `lr` for training)
    pub metrics: MetricSnapshot,
}

/// How a logged run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Finished,
    /// An epoch returned an error, or the run was interrupted
    Failed,
    /// The session was dropped while panicking
    Crashed,
}

// ─── EpochRunner ──────────────────────────────────────────────────────────────
/// A model plus everything needed to train and validate it for one epoch.
///
/// Implementations:
///   - Trainer<B> → burn autodiff training on real data loaders
///   - test doubles → scripted loss sequences
pub trait EpochRunner {
    /// Gradient-updating pass over the training split.
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochSummary>;

    /// Forward-only pass over the validation split.
    fn val_epoch(&mut self, epoch: usize) -> Result<EpochSummary>;

    /// Persist the current parameters, returning the file actually written.
    fn save_checkpoint(&self, path: &Path) -> Result<std::path::PathBuf>;
}

// ─── ExperimentLogger ─────────────────────────────────────────────────────────
/// An experiment-tracking session.
///
/// Implementations:
///   - FileRunLogger → writes records and artifacts under a run directory
pub trait ExperimentLogger {
    /// The effective configuration for this run.
    fn cfg(&self) -> &ExperimentConfig;

    /// Merge a tagged record into the current epoch's entry.
    fn add(&mut self, record: LogRecord) -> Result<()>;

    /// Flush the current epoch's entry and start a new one.
    fn upload(&mut self) -> Result<()>;

    /// Store a model file as a tracked artifact.
    fn log_model(&mut self, path: &Path) -> Result<()>;

    /// Close the session with the run's outcome. Called exactly once per session.
    fn finish(&mut self, status: RunStatus) -> Result<()>;
}
