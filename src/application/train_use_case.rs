// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Load the config file, if one was given   (Layer 6 - infra)
//   Step 2: Decide logging, resolve effective config (Layer 5 - ml)
//   Step 3: Parse trainer.device                      (this layer)
//   Step 4: Build the Trainer on that backend         (Layer 5 - ml)
//   Step 5: Fit, honouring the shutdown flag          (Layer 5 - ml)
//
// With no config file (sweep mode) the configuration comes from the
// sweep environment through the logging session.
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;
use std::sync::{atomic::AtomicBool, Arc};

use crate::application::backend::{dispatch, BackendJob, DeviceSpec};
use crate::domain::config::ExperimentConfig;
use crate::infra::config_loader::load_config;
use crate::infra::run_logger::LoggerSession;
use crate::ml::fit::FitReport;
use crate::ml::trainer::{resolve_run, Trainer};

// ─── Run Options ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Config file; `None` means sweep mode
    pub config_path: Option<PathBuf>,
    pub run_name:    Option<String>,
    pub log_dir:     PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    options:  TrainOptions,
    shutdown: Arc<AtomicBool>,
}

impl TrainUseCase {
    pub fn new(options: TrainOptions, shutdown: Arc<AtomicBool>) -> Self {
        Self { options, shutdown }
    }

    /// Execute the full training run end to end
    pub fn execute(&self) -> Result<FitReport> {
        let opts = &self.options;

        // ── Step 1: Config file ───────────────────────────────────────────────
        let config = opts.config_path.as_deref().map(load_config).transpose()?;

        // ── Step 2: Logging session + effective config ────────────────────────
        let (config, logger) = resolve_run(config, opts.run_name.clone(), &opts.log_dir)?;

        // ── Step 3: Backend ───────────────────────────────────────────────────
        // A bad device string drops the session here, which closes it as failed.
        let device: DeviceSpec = config.trainer.device.parse()?;

        // ── Steps 4–5: Build and fit ──────────────────────────────────────────
        dispatch(device, TrainJob { config, logger, shutdown: self.shutdown.clone() })
    }
}

struct TrainJob {
    config:   ExperimentConfig,
    logger:   Option<LoggerSession>,
    shutdown: Arc<AtomicBool>,
}

impl BackendJob for TrainJob {
    type Output = FitReport;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<FitReport> {
        let mut trainer = Trainer::<B>::new(self.config, self.logger, device)?.with_shutdown(self.shutdown);
        trainer.fit()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{sample_config, ComponentSpec};
    use std::fs;

    #[test]
    fn test_logged_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config();
        config.trainer.model_path = dir.path().join("ckpt").join("best.pt");
        config.dataset = ComponentSpec::new("Blobs").with_setting("n_samples", 90);
        let config_path = dir.path().join("exp.json");
        fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

        let options = TrainOptions {
            config_path: Some(config_path),
            run_name:    Some("e2e".into()),
            log_dir:     dir.path().join("runs"),
        };
        let report = TrainUseCase::new(options, Arc::new(AtomicBool::new(false))).execute().unwrap();
        assert_eq!(report.epochs_completed, 2);

        let run_dir = dir.path().join("runs").join("e2e");
        let lines = fs::read_to_string(run_dir.join("metrics.jsonl")).unwrap();
        assert_eq!(lines.lines().count(), 2);
        let checkpoint = report.checkpoint.unwrap();
        assert!(checkpoint.exists());
        assert!(run_dir.join("artifacts").join(checkpoint.file_name().unwrap()).exists());
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(run_dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["status"], "finished");
    }

    #[test]
    fn test_bad_device_is_rejected_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config();
        config.trainer.device = "tpu".into();
        let config_path = dir.path().join("exp.json");
        fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

        let options = TrainOptions { config_path: Some(config_path), run_name: None, log_dir: dir.path().into() };
        assert!(TrainUseCase::new(options, Arc::new(AtomicBool::new(false))).execute().is_err());
    }
}
