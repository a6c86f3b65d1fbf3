// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Rebuilds the run described by a config file, restores its best
// checkpoint from trainer.model_path and runs one validation pass.
// The validation split is reproduced from the dataset seed, so the
// numbers match what training reported for that checkpoint.

use anyhow::Result;
use burn::tensor::backend::AutodiffBackend;
use std::path::PathBuf;

use crate::application::backend::{dispatch, BackendJob, DeviceSpec};
use crate::domain::config::ExperimentConfig;
use crate::domain::traits::{EpochRunner, EpochSummary};
use crate::infra::config_loader::load_config;
use crate::ml::trainer::Trainer;

pub struct EvaluateUseCase {
    config_path: PathBuf,
}

impl EvaluateUseCase {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn execute(&self) -> Result<EpochSummary> {
        let config = load_config(&self.config_path)?;
        let device: DeviceSpec = config.trainer.device.parse()?;
        dispatch(device, EvaluateJob { config })
    }
}

struct EvaluateJob {
    config: ExperimentConfig,
}

impl BackendJob for EvaluateJob {
    type Output = EpochSummary;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<EpochSummary> {
        let mut trainer = Trainer::<B>::new(self.config, None, device)?;
        trainer.restore_best()?;
        trainer.val_epoch(1)
    }
}
