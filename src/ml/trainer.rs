// ============================================================
// Layer 5 — Trainer
// ============================================================
// Builds every component of a run from an ExperimentConfig and runs
// the burn side of each epoch. The epoch schedule itself lives in
// ml::fit; Trainer is the EpochRunner it drives.
//
// Construction order:
//   data loaders → loss → model (on device) → optimizer (bound to
//   the model) → scheduler (bound to the optimizer, when configured)
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend, with
//     dropout disabled and no graph recorded
//   - loss.backward() + GradientsParams::from_grads replaces any
//     explicit gradient zeroing: gradients are fresh every batch
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{module::AutodiffModule, optim::GradientsParams, prelude::*, tensor::backend::AutodiffBackend};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::data::loader::{get_dataloaders, DataLoaders};
use crate::domain::config::ExperimentConfig;
use crate::domain::error::{Split, TrainError};
use crate::domain::traits::{EpochRunner, EpochSummary, ExperimentLogger, MetricSnapshot};
use crate::infra::checkpoint;
use crate::infra::run_logger::LoggerSession;
use crate::ml::fit::{fit_loop, FitReport};
use crate::ml::loss::{get_loss, Loss};
use crate::ml::metrics::{compute_metrics, init_exec_params, snapshot, ExecParams, MetricSet, Predictions};
use crate::ml::model::{get_model, Classifier, DataShape};
use crate::ml::optimizer::{get_optimizer, OptimizerHandle};
use crate::ml::scheduler::{get_scheduler, LrScheduler, ScheduleContext};

/// Decide whether a run is logged, and what its effective config is.
///
/// A run name, or the absence of a config (sweep mode), turns logging
/// on; the logger's config then wins, since a sweep may have
/// overridden it. Otherwise the given config is used as-is.
pub fn resolve_run(
    config:   Option<ExperimentConfig>,
    run_name: Option<String>,
    log_dir:  &Path,
) -> Result<(ExperimentConfig, Option<LoggerSession>)> {
    match (config, run_name) {
        (Some(config), None) => Ok((config, None)),
        (config, run_name) => {
            let session = LoggerSession::start(config, run_name, log_dir)?;
            Ok((session.cfg().clone(), Some(session)))
        }
    }
}

pub struct Trainer<B: AutodiffBackend> {
    metrics:    MetricSet,
    n_epochs:   usize,
    device:     B::Device,
    model_path: PathBuf,
    loaders:    DataLoaders<B>,
    loss:       Loss,
    model:      Classifier<B>,
    optimizer:  OptimizerHandle<Classifier<B>, B>,
    scheduler:  Option<Box<dyn LrScheduler>>,
    logger:     Option<LoggerSession>,
    shutdown:   Option<Arc<AtomicBool>>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: ExperimentConfig, logger: Option<LoggerSession>, device: B::Device) -> Result<Self> {
        config.validate()?;
        let metrics    = MetricSet::parse(&config.trainer.metrics)?;
        let n_epochs   = config.trainer.n_epochs;
        let model_path = config.trainer.model_path.clone();

        let loaders = get_dataloaders::<B>(&config.dataset)?;
        let loss    = get_loss(&config.loss)?;

        let shape = DataShape { num_features: loaders.num_features, num_classes: loaders.num_classes };
        let model: Classifier<B> = get_model(&config.model, shape, &device)?;

        let mut optimizer = get_optimizer(&config.optimizer, &model)?;
        let scheduler = match &config.scheduler {
            Some(spec) => {
                let ctx = ScheduleContext {
                    base_lr:         optimizer.current_lr(),
                    steps_per_epoch: loaders.train_batches,
                    n_epochs,
                };
                let scheduler = get_scheduler(spec, ctx)?;
                optimizer.set_lr(scheduler.learning_rate());
                Some(scheduler)
            }
            None => None,
        };

        tracing::info!(
            "Trainer ready: {} epochs on {:?}, optimizer '{}' ({:?}), metrics [{}], best checkpoint → '{}'",
            n_epochs,
            device,
            optimizer.name(),
            optimizer.origin(),
            metrics.names().collect::<Vec<_>>().join(", "),
            model_path.display()
        );

        Ok(Self {
            metrics,
            n_epochs,
            device,
            model_path,
            loaders,
            loss,
            model,
            optimizer,
            scheduler,
            logger,
            shutdown: None,
        })
    }

    /// Abort at the next batch once `flag` is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn current_lr(&self) -> f64 {
        self.optimizer.current_lr()
    }

    /// Train for the configured number of epochs, keeping the best checkpoint.
    /// The logging session, if any, is closed whatever the outcome.
    pub fn fit(&mut self) -> Result<FitReport> {
        let mut session = self.logger.take();
        let model_path  = self.model_path.clone();
        let n_epochs    = self.n_epochs;
        let logger      = session.as_mut().map(|s| s as &mut dyn ExperimentLogger);
        fit_loop(self, n_epochs, &model_path, logger)
    }

    /// Replace the current parameters with the saved best checkpoint.
    pub fn restore_best(&mut self) -> Result<()> {
        self.model = checkpoint::load::<B, _>(self.model.clone(), &self.model_path, &self.device)?;
        Ok(())
    }

    fn check_shutdown(&self, epoch: usize) -> Result<(), TrainError> {
        match &self.shutdown {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(TrainError::Interrupted { epoch }),
            _ => Ok(()),
        }
    }

    fn batch_metrics<BK: Backend>(
        &self,
        outputs: Tensor<BK, 2>,
        targets: Tensor<BK, 1, Int>,
        exec:    &mut ExecParams,
    ) -> MetricSnapshot {
        if self.metrics.is_empty() {
            return snapshot(&self.metrics, exec);
        }
        compute_metrics(&self.metrics, &Predictions::from_tensors(outputs, targets), exec)
    }
}

impl<B: AutodiffBackend> EpochRunner for Trainer<B> {
    fn train_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let mut exec = init_exec_params(&self.metrics);
        let bar = progress_bar(self.loaders.train_batches, epoch, Split::Train);

        for batch in self.loaders.train.iter() {
            self.check_shutdown(epoch)?;
            let batch_size = batch.batch_size();
            let inputs     = batch.inputs.to_device(&self.device);
            let targets    = batch.targets.to_device(&self.device);

            let outputs = self.model.forward(inputs);
            let loss    = self.loss.forward(outputs.clone(), targets.clone());
            let batch_loss: f64 = loss.clone().into_scalar().elem::<f64>();

            // Backward pass + optimizer update
            let grads  = GradientsParams::from_grads(loss.backward(), &self.model);
            self.model = self.optimizer.step(self.model.clone(), grads);
            if let Some(scheduler) = self.scheduler.as_mut() {
                self.optimizer.set_lr(scheduler.step());
            }

            let epoch_loss = exec.record_loss(batch_loss, batch_size);
            let metrics    = self.batch_metrics(outputs.detach(), targets, &mut exec);
            bar.set_message(postfix(epoch_loss, &metrics, Some(self.optimizer.current_lr())));
            bar.inc(1);
        }
        bar.finish();

        if exec.dataset_size == 0 {
            return Err(TrainError::EmptyEpoch { split: Split::Train }.into());
        }
        Ok(summarize(&self.metrics, &exec, Some(self.optimizer.current_lr())))
    }

    fn val_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let mut exec = init_exec_params(&self.metrics);
        let bar = progress_bar(self.loaders.val_batches, epoch, Split::Val);

        // model.valid() → Classifier<B::InnerBackend>
        // dropout disabled for deterministic evaluation
        let model = self.model.valid();

        for batch in self.loaders.val.iter() {
            self.check_shutdown(epoch)?;
            let batch_size = batch.batch_size();
            let inputs     = batch.inputs.to_device(&self.device);
            let targets    = batch.targets.to_device(&self.device);

            let outputs = model.forward(inputs);
            let batch_loss: f64 = self
                .loss
                .forward(outputs.clone(), targets.clone())
                .into_scalar()
                .elem::<f64>();

            let epoch_loss = exec.record_loss(batch_loss, batch_size);
            let metrics    = self.batch_metrics(outputs, targets, &mut exec);
            bar.set_message(postfix(epoch_loss, &metrics, None));
            bar.inc(1);
        }
        bar.finish();

        if exec.dataset_size == 0 {
            return Err(TrainError::EmptyEpoch { split: Split::Val }.into());
        }
        Ok(summarize(&self.metrics, &exec, None))
    }

    fn save_checkpoint(&self, path: &Path) -> Result<PathBuf> {
        checkpoint::save::<B, _>(&self.model, path)
    }
}

/// Final metrics of a pass, with `loss` (and `lr` when training) added.
fn summarize(metrics: &MetricSet, exec: &ExecParams, lr: Option<f64>) -> EpochSummary {
    let loss = exec.epoch_loss();
    let mut values = snapshot(metrics, exec);
    values.insert("loss".to_string(), loss);
    if let Some(lr) = lr {
        values.insert("lr".to_string(), lr);
    }
    EpochSummary { loss, metrics: values }
}

fn progress_bar(batches: usize, epoch: usize, split: Split) -> ProgressBar {
    let bar = ProgressBar::new(batches as u64);
    let style = ProgressStyle::with_template("{prefix:>12} [{elapsed_precise}] {bar:30.cyan/blue} {pos:>4}/{len:4} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar.set_prefix(format!("epoch {epoch} {split}"));
    bar
}

/// `loss=0.4321 accuracy=0.9120 lr=1.00e-3`
fn postfix(loss: f64, metrics: &MetricSnapshot, lr: Option<f64>) -> String {
    let mut parts = vec![format!("loss={loss:.4}")];
    parts.extend(metrics.iter().map(|(name, value)| format!("{name}={value:.4}")));
    if let Some(lr) = lr {
        parts.push(format!("lr={lr:.2e}"));
    }
    parts.join(" ")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{sample_config, ComponentSpec};
    use crate::domain::error::{ComponentError, ComponentKind};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn small_config(model_path: PathBuf) -> ExperimentConfig {
        let mut config = sample_config();
        config.trainer.model_path = model_path;
        config.trainer.metrics = vec!["accuracy".into(), "top2_accuracy".into()];
        config.dataset = ComponentSpec::new("Blobs")
            .with_setting("n_samples", 120)
            .with_setting("batch_size", 16);
        config
    }

    #[test]
    fn test_fit_writes_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path().join("best.pt"));

        let mut trainer = Trainer::<TestBackend>::new(config, None, Default::default()).unwrap();
        let report = trainer.fit().unwrap();

        assert_eq!(report.epochs_completed, 2);
        assert_eq!(report.best_epoch.is_some(), report.best_val_loss.is_finite());
        assert!(checkpoint::checkpoint_file::<TestBackend>(&dir.path().join("best.pt")).exists());
        trainer.restore_best().unwrap();
    }

    #[test]
    fn test_epoch_summary_has_loss_metrics_and_lr() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer =
            Trainer::<TestBackend>::new(small_config(dir.path().join("best.pt")), None, Default::default()).unwrap();

        let train = trainer.train_epoch(1).unwrap();
        assert!(train.loss.is_finite());
        for key in ["accuracy", "top2_accuracy", "loss", "lr"] {
            assert!(train.metrics.contains_key(key), "{key}");
        }

        let val = trainer.val_epoch(1).unwrap();
        assert!(!val.metrics.contains_key("lr"));
        assert!((0.0..=1.0).contains(&val.metrics["accuracy"]));
        assert!(val.metrics["top2_accuracy"] >= val.metrics["accuracy"]);
    }

    #[test]
    fn test_scheduler_rate_applied_at_construction_and_per_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("best.pt"));
        config.optimizer = ComponentSpec::new("Sgd").with_setting("lr", 0.1);
        config.scheduler = Some(ComponentSpec::new("StepLR").with_setting("step_size", 1).with_setting("gamma", 0.5));

        let mut trainer = Trainer::<TestBackend>::new(config, None, Default::default()).unwrap();
        assert_eq!(trainer.current_lr(), 0.1);

        let steps = trainer.loaders.train_batches as i32;
        trainer.train_epoch(1).unwrap();
        assert!((trainer.current_lr() - 0.1 * 0.5f64.powi(steps)).abs() < 1e-12);
    }

    #[test]
    fn test_shutdown_flag_interrupts_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let mut trainer = Trainer::<TestBackend>::new(small_config(dir.path().join("best.pt")), None, Default::default())
            .unwrap()
            .with_shutdown(flag);

        let err = trainer.fit().unwrap_err();
        assert_eq!(err.downcast_ref::<TrainError>(), Some(&TrainError::Interrupted { epoch: 1 }));
    }

    #[test]
    fn test_unknown_metric_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("best.pt"));
        config.trainer.metrics = vec!["f1".into()];

        let err = Trainer::<TestBackend>::new(config, None, Default::default()).err().unwrap();
        assert_eq!(
            err.downcast_ref::<ComponentError>(),
            Some(&ComponentError::not_found(ComponentKind::Metric, "f1"))
        );
    }

    #[test]
    fn test_failed_construction_marks_logged_run_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path().join("best.pt"));
        config.trainer.metrics = vec!["f1".into()];
        let (config, logger) = resolve_run(Some(config), Some("broken".into()), dir.path()).unwrap();
        let run_dir = logger.as_ref().unwrap().run_dir().to_path_buf();

        assert!(Trainer::<TestBackend>::new(config, logger, Default::default()).is_err());
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["status"], "failed");
    }

    #[test]
    fn test_resolve_run_without_run_name_disables_logging() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logger) = resolve_run(Some(sample_config()), None, dir.path()).unwrap();
        assert_eq!(config, sample_config());
        assert!(logger.is_none());
    }

    #[test]
    fn test_resolve_run_with_run_name_enables_logging() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logger) = resolve_run(Some(sample_config()), Some("named".into()), dir.path()).unwrap();
        let logger = logger.unwrap();
        assert_eq!(logger.cfg(), &config);
        assert!(logger.run_dir().join("config.json").exists());
    }

    #[test]
    fn test_postfix_format() {
        let metrics = MetricSnapshot::from([("accuracy".to_string(), 0.912)]);
        assert_eq!(postfix(0.43214, &metrics, Some(1e-3)), "loss=0.4321 accuracy=0.9120 lr=1.00e-3");
    }
}
