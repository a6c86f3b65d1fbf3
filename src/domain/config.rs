// ============================================================
// Layer 3 — Experiment Configuration
// ============================================================
// The nested settings tree every factory reads from:
//
//   trainer:    metrics, n_epochs, device, model_path
//   dataset:    { name, settings }
//   model:      { name, settings }
//   loss:       { name, settings }
//   optimizer:  { name, settings }
//   scheduler:  { name, settings }   (optional)
//
// Each component section names an implementation and carries a
// free-form keyword map. The factory that owns the section turns
// that map into its own typed settings struct, so unknown or
// mistyped keys surface as errors at construction time.
//
// Reference: serde documentation (derive, aliases, defaults)

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::{ComponentError, ComponentKind, TrainError};

/// Free-form keyword settings of one component.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// The full, resolved configuration of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub trainer: TrainerSection,
    pub dataset: ComponentSpec,
    pub model: ComponentSpec,
    pub loss: ComponentSpec,
    pub optimizer: ComponentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<ComponentSpec>,
}

/// Settings read by the trainer itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSection {
    /// Metric names reported every batch, e.g. `["accuracy"]`; may be empty
    pub metrics: Vec<String>,

    /// Number of train + validation passes
    pub n_epochs: usize,

    /// Compute device identifier (`cpu`, `wgpu`, `wgpu:0`, ...)
    pub device: String,

    /// Where the best checkpoint is written
    pub model_path: PathBuf,
}

/// A named implementation plus its keyword settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    #[serde(
        alias = "dataset_name",
        alias = "model_name",
        alias = "loss_name",
        alias = "optimizer_name",
        alias = "scheduler_name"
    )]
    pub name: String,

    #[serde(default)]
    pub settings: Settings,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), settings: Settings::new() }
    }

    /// Builder-style helper, mostly used by tests and defaults.
    pub fn with_setting(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Deserialize the keyword settings into a typed struct.
    pub fn settings_as<T: DeserializeOwned>(&self, kind: ComponentKind) -> Result<T, ComponentError> {
        serde_json::from_value(serde_json::Value::Object(self.settings.clone())).map_err(|e| {
            ComponentError::InvalidSettings {
                kind,
                name: self.name.clone(),
                reason: e.to_string(),
            }
        })
    }

    /// Remove one key from the settings and return it as f64.
    /// Used for keys consumed by the caller rather than the component
    /// (e.g. `lr`, which burn passes per step instead of at init).
    pub fn take_f64(&mut self, key: &str, kind: ComponentKind) -> Result<Option<f64>, ComponentError> {
        match self.settings.remove(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| ComponentError::InvalidSettings {
                kind,
                name: self.name.clone(),
                reason: format!("`{key}` must be a number, got {value}"),
            }),
        }
    }
}

impl ExperimentConfig {
    /// Structural checks that serde alone cannot express.
    pub fn validate(&self) -> Result<(), TrainError> {
        let mut errors = Vec::new();

        if self.trainer.n_epochs == 0 {
            errors.push("trainer.n_epochs must be greater than 0".to_string());
        }
        if self.trainer.device.trim().is_empty() {
            errors.push("trainer.device must not be empty".to_string());
        }
        if self.trainer.model_path.as_os_str().is_empty() {
            errors.push("trainer.model_path must not be empty".to_string());
        }

        let sections = [
            ("dataset", Some(&self.dataset)),
            ("model", Some(&self.model)),
            ("loss", Some(&self.loss)),
            ("optimizer", Some(&self.optimizer)),
            ("scheduler", self.scheduler.as_ref()),
        ];
        for (section, spec) in sections {
            if let Some(spec) = spec {
                if spec.name.trim().is_empty() {
                    errors.push(format!("{section}.name must not be empty"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TrainError::InvalidConfig(errors.join("; ")))
        }
    }

    /// The configuration as a JSON tree, used for overrides and logging.
    pub fn to_value(&self) -> serde_json::Value {
        // Every field is a plain serde type, serialisation cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Apply dotted-path overrides such as `optimizer.settings.lr = 0.01`
/// onto a configuration tree, creating intermediate objects as needed.
pub fn apply_overrides(tree: &mut serde_json::Value, overrides: &Settings) {
    for (path, value) in overrides {
        let mut node = &mut *tree;
        let mut keys = path.split('.').peekable();
        while let Some(key) = keys.next() {
            if !node.is_object() {
                *node = serde_json::Value::Object(Settings::new());
            }
            let Some(map) = node.as_object_mut() else { break };
            if keys.peek().is_none() {
                map.insert(key.to_string(), value.clone());
                break;
            }
            node = map
                .entry(key.to_string())
                .or_insert_with(|| serde_json::Value::Object(Settings::new()));
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_config() -> ExperimentConfig {
    ExperimentConfig {
        trainer: TrainerSection {
            metrics: vec!["accuracy".to_string()],
            n_epochs: 2,
            device: "cpu".to_string(),
            model_path: PathBuf::from("/tmp/best.pt"),
        },
        dataset: ComponentSpec::new("Blobs"),
        model: ComponentSpec::new("Mlp"),
        loss: ComponentSpec::new("CrossEntropyLoss"),
        optimizer: ComponentSpec::new("Adam").with_setting("lr", 0.01),
        scheduler: None,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_optimizer_name_alias() {
        let spec: ComponentSpec = serde_json::from_value(json!({
            "optimizer_name": "SGD",
            "settings": { "lr": 0.1, "momentum": 0.9 }
        }))
        .unwrap();
        assert_eq!(spec.name, "SGD");
        assert_eq!(spec.settings["momentum"], json!(0.9));
    }

    #[test]
    fn test_scheduler_section_is_optional() {
        let cfg: ExperimentConfig = serde_json::from_value(json!({
            "trainer": { "metrics": ["accuracy"], "n_epochs": 3, "device": "cpu", "model_path": "best.pt" },
            "dataset": { "name": "Blobs" },
            "model": { "name": "Mlp" },
            "loss": { "name": "CrossEntropyLoss" },
            "optimizer": { "name": "Adam" }
        }))
        .unwrap();
        assert!(cfg.scheduler.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_epochs_rejected() {
        let mut cfg = sample_config();
        cfg.trainer.n_epochs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("n_epochs"));
    }

    #[test]
    fn test_take_f64_removes_key() {
        let mut spec = ComponentSpec::new("Adam").with_setting("lr", 0.5).with_setting("beta_1", 0.8);
        let lr = spec.take_f64("lr", ComponentKind::Optimizer).unwrap();
        assert_eq!(lr, Some(0.5));
        assert!(!spec.settings.contains_key("lr"));
        assert!(spec.settings.contains_key("beta_1"));
    }

    #[test]
    fn test_take_f64_rejects_strings() {
        let mut spec = ComponentSpec::new("Adam").with_setting("lr", "fast");
        assert!(spec.take_f64("lr", ComponentKind::Optimizer).is_err());
    }

    #[test]
    fn test_apply_overrides_nested_and_new_keys() {
        let mut tree = sample_config().to_value();
        let overrides = json!({
            "optimizer.settings.lr": 0.001,
            "trainer.n_epochs": 7,
            "scheduler.name": "StepLR"
        });
        apply_overrides(&mut tree, overrides.as_object().unwrap());

        assert_eq!(tree["optimizer"]["settings"]["lr"], json!(0.001));
        assert_eq!(tree["trainer"]["n_epochs"], json!(7));
        assert_eq!(tree["scheduler"]["name"], json!("StepLR"));
    }
}
