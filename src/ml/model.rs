use anyhow::Result;
use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    prelude::*,
};
use serde::Deserialize;

use crate::domain::config::ComponentSpec;
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::registry::TieredRegistry;

/// Input width and class count, taken from the loaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShape {
    pub num_features: usize,
    pub num_classes:  usize,
}

/// Turns model settings into an architecture description.
pub type ModelCtor = fn(&ComponentSpec, DataShape) -> Result<ClassifierConfig, ComponentError>;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub num_features: usize,
    pub num_classes:  usize,
    /// Widths of the hidden layers; empty means a single linear layer
    pub hidden:       Vec<usize>,
    #[config(default = 0.0)]
    pub dropout:      f64,
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let mut width = self.num_features;
        let hidden: Vec<Linear<B>> = self
            .hidden
            .iter()
            .map(|&next| {
                let layer = LinearConfig::new(width, next).init(device);
                width = next;
                layer
            })
            .collect();
        let head    = LinearConfig::new(width, self.num_classes).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        Classifier { hidden, head, dropout, activation: Relu::new() }
    }
}

#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    pub hidden:     Vec<Linear<B>>,
    pub head:       Linear<B>,
    pub dropout:    Dropout,
    pub activation: Relu,
}

impl<B: Backend> Classifier<B> {
    /// inputs: [batch, num_features] → logits: [batch, num_classes]
    pub fn forward(&self, inputs: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = inputs;
        for layer in &self.hidden {
            x = self.dropout.forward(self.activation.forward(layer.forward(x)));
        }
        self.head.forward(x)
    }
}

pub fn model_registry() -> TieredRegistry<ModelCtor> {
    let mut registry = TieredRegistry::new(ComponentKind::Model);
    registry.library.register("Linear", linear as ModelCtor);
    registry.plugins.register("Mlp", mlp as ModelCtor);
    registry
}

/// Resolve the `model` section and initialise the model on `device`.
pub fn get_model<B: Backend>(spec: &ComponentSpec, shape: DataShape, device: &B::Device) -> Result<Classifier<B>> {
    let registry = model_registry();
    let (origin, ctor) = registry.resolve(&spec.name)?;
    let config = ctor(spec, shape)?;
    tracing::info!(
        "Model '{}' ({:?}): {} → {:?} → {}",
        spec.name, origin, config.num_features, config.hidden, config.num_classes
    );
    Ok(config.init(device))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearSettings {}

fn linear(spec: &ComponentSpec, shape: DataShape) -> Result<ClassifierConfig, ComponentError> {
    let _: LinearSettings = spec.settings_as(ComponentKind::Model)?;
    Ok(ClassifierConfig::new(shape.num_features, shape.num_classes, Vec::new()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MlpSettings {
    #[serde(default = "default_hidden")]
    hidden:  Vec<usize>,
    #[serde(default = "default_dropout")]
    dropout: f64,
}

fn default_hidden()  -> Vec<usize> { vec![64] }
fn default_dropout() -> f64        { 0.1 }

fn mlp(spec: &ComponentSpec, shape: DataShape) -> Result<ClassifierConfig, ComponentError> {
    let s: MlpSettings = spec.settings_as(ComponentKind::Model)?;
    if s.hidden.iter().any(|&w| w == 0) {
        return Err(ComponentError::invalid(ComponentKind::Model, &spec.name, "hidden widths must be > 0"));
    }
    if !(0.0..1.0).contains(&s.dropout) {
        return Err(ComponentError::invalid(ComponentKind::Model, &spec.name, "dropout must be in [0, 1)"));
    }
    Ok(ClassifierConfig::new(shape.num_features, shape.num_classes, s.hidden).with_dropout(s.dropout))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    const SHAPE: DataShape = DataShape { num_features: 3, num_classes: 4 };

    #[test]
    fn test_mlp_output_shape() {
        let device = Default::default();
        let spec = ComponentSpec::new("Mlp").with_setting("hidden", serde_json::json!([8, 5]));
        let model = get_model::<NdArray>(&spec, SHAPE, &device).unwrap();
        assert_eq!(model.hidden.len(), 2);

        let logits = model.forward(Tensor::zeros([6, 3], &device));
        assert_eq!(logits.dims(), [6, 4]);
    }

    #[test]
    fn test_linear_has_no_hidden_layers() {
        let device = Default::default();
        let model = get_model::<NdArray>(&ComponentSpec::new("Linear"), SHAPE, &device).unwrap();
        assert!(model.hidden.is_empty());
    }

    #[test]
    fn test_linear_rejects_settings() {
        let spec = ComponentSpec::new("Linear").with_setting("hidden", serde_json::json!([8]));
        assert!(linear(&spec, SHAPE).is_err());
    }

    #[test]
    fn test_unknown_model() {
        let err = get_model::<NdArray>(&ComponentSpec::new("ResNet50"), SHAPE, &Default::default())
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<ComponentError>(),
            Some(&ComponentError::not_found(ComponentKind::Model, "ResNet50"))
        );
    }
}
