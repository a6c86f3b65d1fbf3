// ============================================================
// Layer 5 — Loss Functions
// ============================================================
// The `loss` section resolves to a backend-agnostic Loss value.
// It is evaluated on two backends per epoch:
//
//   training   → Autodiff<B>   (graph recorded for backward)
//   validation → B::InnerBackend (model.valid(), no graph)
//
// so the loss carries only its hyperparameters and builds the
// tensor computation for whichever backend it's handed.
//
//   CrossEntropyLoss — burn::nn::loss::CrossEntropyLoss,
//                      optional label smoothing
//   FocalLoss        — -(1 - p_t)^γ · log p_t, averaged over the batch
//
// Reference: Lin et al. (2017) Focal Loss for Dense Object Detection

use anyhow::Result;
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*, tensor::activation::log_softmax};
use serde::Deserialize;

use crate::domain::config::ComponentSpec;
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::registry::TieredRegistry;

pub type LossCtor = fn(&ComponentSpec) -> Result<Loss, ComponentError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Loss {
    CrossEntropy { smoothing: Option<f32> },
    Focal { gamma: f64 },
}

impl Loss {
    /// logits: [batch, classes], targets: [batch] → scalar loss [1]
    pub fn forward<B: Backend>(&self, logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        match self {
            Loss::CrossEntropy { smoothing } => CrossEntropyLossConfig::new()
                .with_smoothing(*smoothing)
                .init(&logits.device())
                .forward(logits, targets),
            Loss::Focal { gamma } => {
                let [batch_size, _] = logits.dims();
                // log p_t for every row: [batch, 1]
                let log_pt = log_softmax(logits, 1).gather(1, targets.reshape([batch_size, 1]));
                let pt     = log_pt.clone().exp();
                let weight = pt.neg().add_scalar(1.0).powf_scalar(*gamma);
                weight.mul(log_pt).neg().mean()
            }
        }
    }
}

pub fn loss_registry() -> TieredRegistry<LossCtor> {
    let mut registry = TieredRegistry::new(ComponentKind::Loss);
    registry.library.register("CrossEntropyLoss", cross_entropy as LossCtor);
    registry.plugins.register("FocalLoss", focal as LossCtor);
    registry
}

/// Resolve the `loss` section.
pub fn get_loss(spec: &ComponentSpec) -> Result<Loss> {
    let registry = loss_registry();
    let (origin, ctor) = registry.resolve(&spec.name)?;
    let loss = ctor(spec)?;
    tracing::info!("Loss '{}' ({:?}): {:?}", spec.name, origin, loss);
    Ok(loss)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrossEntropySettings {
    #[serde(default, alias = "label_smoothing")]
    smoothing: Option<f32>,
}

fn cross_entropy(spec: &ComponentSpec) -> Result<Loss, ComponentError> {
    let s: CrossEntropySettings = spec.settings_as(ComponentKind::Loss)?;
    match s.smoothing {
        Some(alpha) if !(0.0..=1.0).contains(&alpha) => Err(ComponentError::invalid(
            ComponentKind::Loss,
            &spec.name,
            "smoothing must be in [0, 1]",
        )),
        // burn treats zero smoothing as a configuration error
        Some(alpha) if alpha == 0.0 => Ok(Loss::CrossEntropy { smoothing: None }),
        smoothing => Ok(Loss::CrossEntropy { smoothing }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FocalSettings {
    #[serde(default = "default_gamma")]
    gamma: f64,
}

fn default_gamma() -> f64 { 2.0 }

fn focal(spec: &ComponentSpec) -> Result<Loss, ComponentError> {
    let s: FocalSettings = spec.settings_as(ComponentKind::Loss)?;
    if s.gamma < 0.0 {
        return Err(ComponentError::invalid(ComponentKind::Loss, &spec.name, "gamma must be >= 0"));
    }
    Ok(Loss::Focal { gamma: s.gamma })
}
