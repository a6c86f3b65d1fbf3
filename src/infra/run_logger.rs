// ============================================================
// Layer 6 — Run Logger
// ============================================================
// A file-backed experiment-tracking session. Each run gets its own
// directory under the log dir:
//
//   runs/
//     my-run/
//       config.json      ← effective configuration (after overrides)
//       metrics.jsonl    ← one line per uploaded epoch
//       artifacts/       ← model files passed to log_model()
//       summary.json     ← written by finish(): finished, failed or crashed
//
// Example metrics.jsonl line:
//   {"step":1,"timestamp":"2026-01-01T12:00:00Z",
//    "train":{"accuracy":0.81,"loss":0.52,"lr":0.001},
//    "val":{"accuracy":0.84,"loss":0.47}}
//
// Sweeps: when the trainer is started without a configuration, the
// session reads it from the file named by EPOCH_TRAINER_SWEEP_CONFIG.
// In every session, a JSON object of dotted-path overrides in
// EPOCH_TRAINER_SWEEP_OVERRIDES is applied on top, e.g.
//   {"optimizer.settings.lr": 0.01, "trainer.n_epochs": 20}
//
// LoggerSession is the guard the trainer holds. Dropping it without
// finish() still closes the run: "crashed" while panicking, otherwise
// "failed" (the trainer never got to run).
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    env,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::config::{apply_overrides, ExperimentConfig, Settings};
use crate::domain::traits::{ExperimentLogger, LogRecord, RunStatus};
use crate::infra::config_loader::{config_from_value, load_config_value};

pub const SWEEP_CONFIG_ENV:    &str = "EPOCH_TRAINER_SWEEP_CONFIG";
pub const SWEEP_OVERRIDES_ENV: &str = "EPOCH_TRAINER_SWEEP_OVERRIDES";

/// What the sweep environment contributes to a run.
#[derive(Debug, Clone, Default)]
pub struct SweepEnv {
    pub config_path: Option<PathBuf>,
    /// Raw JSON object of dotted-path overrides
    pub overrides:   Option<String>,
}

impl SweepEnv {
    pub fn from_env() -> Self {
        Self {
            config_path: env::var_os(SWEEP_CONFIG_ENV).map(PathBuf::from),
            overrides:   env::var(SWEEP_OVERRIDES_ENV).ok().filter(|s| !s.trim().is_empty()),
        }
    }

    /// Build the effective configuration of a logged run.
    pub fn resolve(&self, config: Option<ExperimentConfig>) -> Result<ExperimentConfig> {
        let mut tree = match (config, &self.config_path) {
            (Some(config), _) => config.to_value(),
            (None, Some(path)) => load_config_value(path)?,
            (None, None) => anyhow::bail!(
                "No configuration given and {SWEEP_CONFIG_ENV} is not set"
            ),
        };

        if let Some(raw) = &self.overrides {
            let overrides: Settings = serde_json::from_str(raw)
                .with_context(|| format!("{SWEEP_OVERRIDES_ENV} must be a JSON object"))?;
            tracing::info!("Applying {} sweep override(s)", overrides.len());
            apply_overrides(&mut tree, &overrides);
        }

        config_from_value(tree)
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    run_name:      &'a str,
    status:        RunStatus,
    started_at:    DateTime<Utc>,
    finished_at:   DateTime<Utc>,
    epochs_logged: usize,
    artifacts:     &'a [PathBuf],
}

/// Writes one run's records and artifacts to disk.
pub struct FileRunLogger {
    run_name:   String,
    run_dir:    PathBuf,
    config:     ExperimentConfig,
    pending:    LogRecord,
    step:       usize,
    artifacts:  Vec<PathBuf>,
    started_at: DateTime<Utc>,
}

impl FileRunLogger {
    /// Create the run directory and record the effective configuration.
    pub fn create(config: ExperimentConfig, run_name: Option<String>, log_dir: &Path) -> Result<Self> {
        let started_at = Utc::now();
        let base_name  = run_name.unwrap_or_else(|| format!("run-{}", started_at.format("%Y%m%d-%H%M%S")));
        let (run_name, run_dir) = unique_run_dir(log_dir, &base_name);

        fs::create_dir_all(run_dir.join("artifacts"))
            .with_context(|| format!("Cannot create run directory '{}'", run_dir.display()))?;
        fs::write(run_dir.join("config.json"), serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("Cannot write config.json in '{}'", run_dir.display()))?;

        tracing::info!("Logging run '{}' to '{}'", run_name, run_dir.display());
        Ok(Self {
            run_name,
            run_dir,
            config,
            pending: LogRecord::new(),
            step: 0,
            artifacts: Vec::new(),
            started_at,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    fn write_summary(&mut self, status: RunStatus) -> Result<()> {
        let summary = RunSummary {
            run_name:      &self.run_name,
            status,
            started_at:    self.started_at,
            finished_at:   Utc::now(),
            epochs_logged: self.step,
            artifacts:     &self.artifacts,
        };
        let path = self.run_dir.join("summary.json");
        fs::write(&path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::info!("Run '{}' {:?} after {} logged epoch(s)", self.run_name, status, self.step);
        Ok(())
    }
}

/// `log_dir/name`, or `log_dir/name-2`, `-3`, ... if taken.
fn unique_run_dir(log_dir: &Path, base: &str) -> (String, PathBuf) {
    let mut name = base.to_string();
    let mut suffix = 1;
    while log_dir.join(&name).exists() {
        suffix += 1;
        name = format!("{base}-{suffix}");
    }
    let dir = log_dir.join(&name);
    (name, dir)
}

impl ExperimentLogger for FileRunLogger {
    fn cfg(&self) -> &ExperimentConfig {
        &self.config
    }

    fn add(&mut self, record: LogRecord) -> Result<()> {
        for (tag, metrics) in record {
            self.pending.entry(tag).or_default().extend(metrics);
        }
        Ok(())
    }

    fn upload(&mut self) -> Result<()> {
        self.step += 1;
        let mut line = serde_json::Map::new();
        line.insert("step".into(), self.step.into());
        line.insert("timestamp".into(), Utc::now().to_rfc3339().into());
        for (tag, metrics) in std::mem::take(&mut self.pending) {
            line.insert(tag, serde_json::to_value(metrics)?);
        }

        let path = self.run_dir.join("metrics.jsonl");
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        writeln!(f, "{}", serde_json::Value::Object(line))?;

        tracing::debug!("Uploaded step {} to '{}'", self.step, path.display());
        Ok(())
    }

    fn log_model(&mut self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .with_context(|| format!("Model path '{}' has no file name", path.display()))?;
        let target = self.run_dir.join("artifacts").join(file_name);
        fs::copy(path, &target)
            .with_context(|| format!("Cannot copy '{}' to '{}'", path.display(), target.display()))?;
        tracing::info!("Logged model artifact '{}'", target.display());
        self.artifacts.push(target);
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        self.write_summary(status)
    }
}

// ─── LoggerSession ────────────────────────────────────────────────────────────
/// The logging session a trainer owns. Finishes at most once, and on
/// drop if nobody finished it.
pub struct LoggerSession {
    inner:    FileRunLogger,
    finished: bool,
}

impl LoggerSession {
    /// Start a session, reading sweep settings from the environment.
    pub fn start(config: Option<ExperimentConfig>, run_name: Option<String>, log_dir: &Path) -> Result<Self> {
        Self::start_with(config, run_name, log_dir, &SweepEnv::from_env())
    }

    pub fn start_with(
        config:   Option<ExperimentConfig>,
        run_name: Option<String>,
        log_dir:  &Path,
        sweep:    &SweepEnv,
    ) -> Result<Self> {
        let config = sweep.resolve(config)?;
        let inner  = FileRunLogger::create(config, run_name, log_dir)?;
        Ok(Self { inner, finished: false })
    }

    pub fn run_dir(&self) -> &Path {
        self.inner.run_dir()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl ExperimentLogger for LoggerSession {
    fn cfg(&self) -> &ExperimentConfig {
        self.inner.cfg()
    }

    fn add(&mut self, record: LogRecord) -> Result<()> {
        self.inner.add(record)
    }

    fn upload(&mut self) -> Result<()> {
        self.inner.upload()
    }

    fn log_model(&mut self, path: &Path) -> Result<()> {
        self.inner.log_model(path)
    }

    fn finish(&mut self, status: RunStatus) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.inner.finish(status)
    }
}

impl Drop for LoggerSession {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let status = if std::thread::panicking() { RunStatus::Crashed } else { RunStatus::Failed };
        if let Err(e) = self.inner.finish(status) {
            tracing::warn!("Failed to close run '{}': {e:#}", self.inner.run_name());
        }
    }
}
