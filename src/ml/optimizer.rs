// ============================================================
// Layer 5 — Optimizer Factory
// ============================================================
// get_optimizer() resolves the `optimizer` section by exact name:
//
//   1. library tier — burn::optim built-ins
//        Sgd, Adam, AdamW, RmsProp
//   2. plugin tier  — optimizers implemented in ml::plugins,
//        registered in the order plugins::register_all lists them
//
// The first tier that knows the name builds it; a miss in both is a
// typed ComponentError::NotFound naming the optimizer.
//
// Burn passes the learning rate to every step() call instead of
// storing it in the optimizer, so `lr` is lifted out of the settings
// and kept on the OptimizerHandle. A scheduler rewrites it there.
//
// Reference: Burn Book §5 (Training), Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, AdamWConfig,
        GradientsParams, Optimizer, RmsPropConfig, SgdConfig,
    },
    tensor::backend::AutodiffBackend,
};
use serde::Deserialize;

use crate::domain::config::ComponentSpec;
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::plugins;
use crate::ml::registry::{Origin, TieredRegistry};

const DEFAULT_LR: f64 = 1e-3;

// ─── DynOptimizer ─────────────────────────────────────────────────────────────
/// Object-safe view of a burn optimizer. Burn's Optimizer trait has an
/// associated Record type, so it cannot be boxed directly.
pub trait DynOptimizer<M, B>: Send
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    fn step(&mut self, lr: f64, module: M, grads: GradientsParams) -> M;
}

impl<M, B, O> DynOptimizer<M, B> for O
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    fn step(&mut self, lr: f64, module: M, grads: GradientsParams) -> M {
        Optimizer::step(self, lr, module, grads)
    }
}

pub type BoxedOptimizer<M, B> = Box<dyn DynOptimizer<M, B>>;

/// Builds an optimizer from its settings (with `lr` already removed).
pub type OptimizerCtor<M, B> = fn(&ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>;

// ─── OptimizerHandle ──────────────────────────────────────────────────────────
/// A constructed optimizer plus the learning rate it steps with.
pub struct OptimizerHandle<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    name:   String,
    origin: Origin,
    lr:     f64,
    inner:  BoxedOptimizer<M, B>,
}

impl<M, B> OptimizerHandle<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    pub fn new(name: impl Into<String>, origin: Origin, lr: f64, inner: BoxedOptimizer<M, B>) -> Self {
        Self { name: name.into(), origin, lr, inner }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn origin(&self) -> Origin { self.origin }

    pub fn current_lr(&self) -> f64 { self.lr }

    pub fn set_lr(&mut self, lr: f64) { self.lr = lr; }

    /// Apply one update with the current learning rate.
    pub fn step(&mut self, module: M, grads: GradientsParams) -> M {
        self.inner.step(self.lr, module, grads)
    }
}

/// Both tiers, freshly registered.
pub fn optimizer_registry<M, B>() -> TieredRegistry<OptimizerCtor<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let mut registry = TieredRegistry::new(ComponentKind::Optimizer);
    registry
        .library
        .register("Sgd", sgd::<M, B> as OptimizerCtor<M, B>)
        .register("SGD", sgd::<M, B> as OptimizerCtor<M, B>)
        .register("Adam", adam::<M, B> as OptimizerCtor<M, B>)
        .register("AdamW", adamw::<M, B> as OptimizerCtor<M, B>)
        .register("RmsProp", rmsprop::<M, B> as OptimizerCtor<M, B>)
        // torch spellings
        .register("RMSprop", rmsprop::<M, B> as OptimizerCtor<M, B>);
    plugins::register_all(&mut registry.plugins);
    registry
}

/// Resolve the `optimizer` section and bind it to `model`'s parameters.
pub fn get_optimizer<M, B>(spec: &ComponentSpec, model: &M) -> Result<OptimizerHandle<M, B>>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let mut settings = spec.clone();
    let lr = settings.take_f64("lr", ComponentKind::Optimizer)?.unwrap_or(DEFAULT_LR);
    if !(lr.is_finite() && lr > 0.0) {
        return Err(ComponentError::invalid(ComponentKind::Optimizer, &spec.name, "lr must be > 0").into());
    }

    let registry = optimizer_registry::<M, B>();
    let (origin, ctor) = registry.resolve(&spec.name)?;
    let inner = ctor(&settings)?;

    tracing::info!(
        "Optimizer '{}' ({:?}) bound to {} parameters, lr={:e}",
        spec.name,
        origin,
        model.num_params(),
        lr
    );
    Ok(OptimizerHandle::new(spec.name.clone(), origin, lr, inner))
}

// ─── Library tier ─────────────────────────────────────────────────────────────
// Unset keys keep burn's own defaults. Key names follow the usual
// Python-side spelling (`betas`, `eps`) with burn's names as aliases.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SgdSettings {
    #[serde(default)]
    momentum:     Option<f64>,
    #[serde(default)]
    dampening:    f64,
    #[serde(default)]
    nesterov:     bool,
    #[serde(default)]
    weight_decay: Option<f32>,
}

fn sgd<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: SgdSettings = spec.settings_as(ComponentKind::Optimizer)?;
    let momentum = s.momentum.filter(|&m| m > 0.0).map(|m| {
        MomentumConfig::new()
            .with_momentum(m)
            .with_dampening(s.dampening)
            .with_nesterov(s.nesterov)
    });
    let config = SgdConfig::new()
        .with_momentum(momentum)
        .with_weight_decay(s.weight_decay.map(WeightDecayConfig::new));
    Ok(Box::new(config.init::<B, M>()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdamSettings {
    #[serde(default)]
    betas:        Option<(f32, f32)>,
    #[serde(default, alias = "epsilon")]
    eps:          Option<f32>,
    #[serde(default)]
    weight_decay: Option<f32>,
}

fn adam<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: AdamSettings = spec.settings_as(ComponentKind::Optimizer)?;
    let mut config = AdamConfig::new().with_weight_decay(s.weight_decay.map(WeightDecayConfig::new));
    if let Some((beta_1, beta_2)) = s.betas {
        config = config.with_beta_1(beta_1).with_beta_2(beta_2);
    }
    if let Some(eps) = s.eps {
        config = config.with_epsilon(eps);
    }
    Ok(Box::new(config.init::<B, M>()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdamWSettings {
    #[serde(default)]
    betas:        Option<(f32, f32)>,
    #[serde(default, alias = "epsilon")]
    eps:          Option<f32>,
    #[serde(default)]
    weight_decay: Option<f32>,
}

fn adamw<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: AdamWSettings = spec.settings_as(ComponentKind::Optimizer)?;
    let mut config = AdamWConfig::new();
    if let Some((beta_1, beta_2)) = s.betas {
        config = config.with_beta_1(beta_1).with_beta_2(beta_2);
    }
    if let Some(eps) = s.eps {
        config = config.with_epsilon(eps);
    }
    if let Some(weight_decay) = s.weight_decay {
        config = config.with_weight_decay(weight_decay);
    }
    Ok(Box::new(config.init::<B, M>()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RmsPropSettings {
    #[serde(default)]
    alpha:        Option<f32>,
    #[serde(default, alias = "epsilon")]
    eps:          Option<f32>,
    #[serde(default)]
    momentum:     Option<f32>,
    #[serde(default)]
    centered:     bool,
    #[serde(default)]
    weight_decay: Option<f32>,
}

fn rmsprop<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: RmsPropSettings = spec.settings_as(ComponentKind::Optimizer)?;
    let mut config = RmsPropConfig::new()
        .with_centered(s.centered)
        .with_weight_decay(s.weight_decay.map(WeightDecayConfig::new));
    if let Some(alpha) = s.alpha {
        config = config.with_alpha(alpha);
    }
    if let Some(eps) = s.eps {
        config = config.with_epsilon(eps);
    }
    if let Some(momentum) = s.momentum {
        config = config.with_momentum(momentum);
    }
    Ok(Box::new(config.init::<B, M>()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{Classifier, ClassifierConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;
    type TestModel   = Classifier<TestBackend>;

    fn model() -> TestModel {
        ClassifierConfig::new(3, 2, vec![4]).init(&Default::default())
    }

    fn build(spec: ComponentSpec) -> Result<OptimizerHandle<TestModel, TestBackend>> {
        get_optimizer::<TestModel, TestBackend>(&spec, &model())
    }

    #[test]
    fn test_library_optimizer_resolves_from_library() {
        let handle = build(ComponentSpec::new("Adam").with_setting("lr", 0.01)).unwrap();
        assert_eq!(handle.origin(), Origin::Library);
        assert_eq!(handle.current_lr(), 0.01);
    }

    #[test]
    fn test_plugin_optimizer_resolves_from_plugins() {
        let handle = build(ComponentSpec::new("Lion")).unwrap();
        assert_eq!(handle.origin(), Origin::Plugin);
        assert_eq!(handle.current_lr(), DEFAULT_LR);
    }

    #[test]
    fn test_every_library_name_is_buildable() {
        let registry = optimizer_registry::<TestModel, TestBackend>();
        for name in registry.library.names().into_iter().chain(registry.plugins.names()) {
            assert!(build(ComponentSpec::new(name)).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_torch_spellings_resolve_from_library() {
        for name in ["SGD", "RMSprop"] {
            let handle = build(ComponentSpec::new(name).with_setting("lr", 0.05)).unwrap();
            assert_eq!(handle.origin(), Origin::Library);
            assert_eq!(handle.name(), name);
        }
    }

    #[test]
    fn test_sgd_with_momentum_settings() {
        let spec = ComponentSpec::new("Sgd")
            .with_setting("lr", 0.1)
            .with_setting("momentum", 0.9)
            .with_setting("nesterov", true)
            .with_setting("weight_decay", 1e-4);
        assert!(build(spec).is_ok());
    }

    #[test]
    fn test_unknown_optimizer_is_typed_not_found() {
        let err = build(ComponentSpec::new("Adamax")).err().unwrap();
        assert_eq!(
            err.downcast_ref::<ComponentError>(),
            Some(&ComponentError::not_found(ComponentKind::Optimizer, "Adamax"))
        );
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = build(ComponentSpec::new("Adam").with_setting("amsgrad", true)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ComponentError>(),
            Some(ComponentError::InvalidSettings { kind: ComponentKind::Optimizer, .. })
        ));
    }

    #[test]
    fn test_non_positive_lr_rejected() {
        assert!(build(ComponentSpec::new("Sgd").with_setting("lr", 0.0)).is_err());
    }
}
