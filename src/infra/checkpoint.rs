// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// Only the best model of a run is kept: one file, overwritten each
// time validation improves. The architecture is rebuilt from the
// experiment configuration, so no sidecar config is written.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack, half precision
//   - Replaces the extension of the path it's given with its own,
//     so `trainer.model_path = "runs/best.pt"` lands on disk as
//     `runs/best.mpk`. checkpoint_file() computes that name.
//   - Type-safe: loading fails if architecture doesn't match
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, FileRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// The file CompactRecorder actually writes for `path`.
pub fn checkpoint_file<B: Backend>(path: &Path) -> PathBuf {
    path.with_extension(<CompactRecorder as FileRecorder<B>>::file_extension())
}

/// Write the model's current parameters, creating parent directories.
/// Returns the file written.
pub fn save<B: Backend, M: Module<B>>(model: &M, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", parent.display()))?;
    }

    CompactRecorder::new()
        .record(model.clone().into_record(), path.to_path_buf())
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

    let written = checkpoint_file::<B>(path);
    tracing::debug!("Saved checkpoint '{}'", written.display());
    Ok(written)
}

/// Load parameters saved by [`save`] into `model`.
pub fn load<B: Backend, M: Module<B>>(model: M, path: &Path, device: &B::Device) -> Result<M> {
    let file = checkpoint_file::<B>(path);
    if !file.exists() {
        anyhow::bail!(
            "No checkpoint at '{}'. Has a training run with this model_path finished an epoch?",
            file.display()
        );
    }

    let record = CompactRecorder::new()
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Cannot load checkpoint '{}'", file.display()))?;

    tracing::info!("Restored checkpoint '{}'", file.display());
    Ok(model.load_record(record))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{Classifier, ClassifierConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_checkpoint_file_replaces_extension() {
        let file = checkpoint_file::<TestBackend>(Path::new("runs/best.pt"));
        let extension = <CompactRecorder as FileRecorder<TestBackend>>::file_extension();
        assert_eq!(file, PathBuf::from("runs/best").with_extension(extension));
        assert_ne!(file.extension(), Some("pt".as_ref()));
    }

    #[test]
    fn test_save_then_load_restores_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("best.pt");
        let device = Default::default();

        let config = ClassifierConfig::new(3, 2, vec![]);
        let trained: Classifier<TestBackend> = config.init(&device);
        let written = save::<TestBackend, _>(&trained, &path).unwrap();
        assert!(written.exists());

        let fresh: Classifier<TestBackend> = config.init(&device);
        let restored = load::<TestBackend, _>(fresh, &path, &device).unwrap();

        let input = Tensor::<TestBackend, 2>::from_floats([[0.5, -1.0, 2.0]], &device);
        let want: Vec<f32> = trained.forward(input.clone()).into_data().iter::<f32>().collect();
        let got: Vec<f32> = restored.forward(input).into_data().iter::<f32>().collect();
        // CompactRecorder stores half precision.
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() < 1e-2, "{got:?} vs {want:?}");
        }
    }

    #[test]
    fn test_load_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let model: Classifier<TestBackend> = ClassifierConfig::new(3, 2, vec![]).init(&Default::default());
        assert!(load::<TestBackend, _>(model, &dir.path().join("best.pt"), &Default::default()).is_err());
    }
}
