// ============================================================
// Layer 6 — Configuration Files
// ============================================================
// Reads an experiment configuration from disk. The format is
// chosen by file extension:
//
//   .json        → serde_json
//   .yaml / .yml → serde_yaml
//   .toml        → toml
//
// Every format is first parsed into a serde_json::Value tree, so
// sweep overrides operate on one representation regardless of the
// source format, and then deserialized and validated.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::config::ExperimentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json")          => Ok(Self::Json),
            Some("yaml" | "yml")  => Ok(Self::Yaml),
            Some("toml")          => Ok(Self::Toml),
            _ => anyhow::bail!(
                "Unsupported config file '{}': expected .json, .yaml, .yml or .toml",
                path.display()
            ),
        }
    }

    pub fn parse(self, text: &str) -> Result<serde_json::Value> {
        let value = match self {
            Self::Json => serde_json::from_str(text)?,
            Self::Yaml => serde_yaml::from_str(text)?,
            Self::Toml => toml::from_str(text)?,
        };
        Ok(value)
    }
}

/// Parse a config file into an untyped tree.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let format = ConfigFormat::from_path(path)?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
    format
        .parse(&text)
        .with_context(|| format!("Cannot parse config file '{}' as {:?}", path.display(), format))
}

/// Turn a tree into a validated configuration.
pub fn config_from_value(value: serde_json::Value) -> Result<ExperimentConfig> {
    let config: ExperimentConfig =
        serde_json::from_value(value).context("Config does not match the expected layout")?;
    config.validate()?;
    Ok(config)
}

/// Parse, deserialize and validate a config file.
pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let config = config_from_value(load_config_value(path)?)
        .with_context(|| format!("Invalid config file '{}'", path.display()))?;
    tracing::info!("Loaded config from '{}'", path.display());
    Ok(config)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::TrainError;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const YAML: &str = r#"
trainer:
  metrics: [accuracy, top2_accuracy]
  n_epochs: 5
  device: cpu
  model_path: runs/best.pt
dataset:
  name: Blobs
  settings: { n_samples: 200, batch_size: 16 }
model:
  model_name: Mlp
  settings: { hidden: [32, 16] }
loss:
  name: CrossEntropyLoss
optimizer:
  name: Sgd
  settings: { lr: 0.1, momentum: 0.9 }
scheduler:
  name: StepLR
  settings: { step_size: 10 }
"#;

    const TOML: &str = r#"
[trainer]
metrics = ["accuracy"]
n_epochs = 2
device = "cpu"
model_path = "best.pt"

[dataset]
name = "Blobs"

[model]
name = "Linear"

[loss]
name = "FocalLoss"
settings = { gamma = 1.5 }

[optimizer]
name = "Lion"
settings = { lr = 0.0003 }
"#;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_yaml_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&write(dir.path(), "exp.yml", YAML)).unwrap();
        assert_eq!(config.trainer.n_epochs, 5);
        assert_eq!(config.model.name, "Mlp");
        assert_eq!(config.scheduler.unwrap().name, "StepLR");
    }

    #[test]
    fn test_toml_and_json_agree() {
        let dir = tempfile::tempdir().unwrap();
        let from_toml = load_config(&write(dir.path(), "exp.toml", TOML)).unwrap();
        let json = serde_json::to_string_pretty(&from_toml).unwrap();
        let from_json = load_config(&write(dir.path(), "exp.json", &json)).unwrap();
        assert_eq!(from_toml, from_json);
        assert_eq!(from_json.loss.settings["gamma"], serde_json::json!(1.5));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert!(ConfigFormat::from_path(Path::new("exp.ini")).is_err());
        assert_eq!(ConfigFormat::from_path(Path::new("EXP.YAML")).unwrap(), ConfigFormat::Yaml);
    }

    #[test]
    fn test_trainer_metrics_key_is_required() {
        let text = YAML.replace("  metrics: [accuracy, top2_accuracy]\n", "");
        let tree = ConfigFormat::Yaml.parse(&text).unwrap();
        assert!(config_from_value(tree).is_err());

        let text = YAML.replace("[accuracy, top2_accuracy]", "[]");
        let tree = ConfigFormat::Yaml.parse(&text).unwrap();
        assert!(config_from_value(tree).unwrap().trainer.metrics.is_empty());
    }

    #[test]
    fn test_validation_runs_after_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let text = YAML.replace("n_epochs: 5", "n_epochs: 0");
        let err = load_config(&write(dir.path(), "exp.yaml", &text)).unwrap_err();
        assert!(matches!(err.downcast_ref::<TrainError>(), Some(TrainError::InvalidConfig(_))));
    }
}
