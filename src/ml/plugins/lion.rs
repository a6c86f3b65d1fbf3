//! Lion: EvoLved Sign Momentum.
//!
//!   c = β1·m + (1 − β1)·g
//!   θ = θ·(1 − lr·λ) − lr·sign(c)
//!   m = β2·m + (1 − β2)·g

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, LearningRate, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};
use serde::Deserialize;

use crate::domain::config::ComponentSpec;
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::optimizer::{BoxedOptimizer, OptimizerCtor};
use crate::ml::registry::Registry;

#[derive(Debug, Clone)]
pub struct Lion {
    beta_1:       f64,
    beta_2:       f64,
    weight_decay: f64,
}

#[derive(Record, Clone)]
pub struct LionState<B: Backend, const D: usize> {
    pub momentum: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Lion {
    type State<const D: usize> = LionState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let momentum = match state {
            Some(state) => state.momentum,
            None => grad.zeros_like(),
        };

        let direction = momentum
            .clone()
            .mul_scalar(self.beta_1)
            .add(grad.clone().mul_scalar(1.0 - self.beta_1))
            .sign();

        let tensor = tensor
            .mul_scalar(1.0 - lr * self.weight_decay)
            .sub(direction.mul_scalar(lr));

        let momentum = momentum
            .mul_scalar(self.beta_2)
            .add(grad.mul_scalar(1.0 - self.beta_2));

        (tensor, Some(LionState { momentum }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        LionState { momentum: state.momentum.to_device(device) }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LionSettings {
    #[serde(default = "default_betas")]
    betas:        (f64, f64),
    #[serde(default)]
    weight_decay: f64,
}

fn default_betas() -> (f64, f64) { (0.9, 0.99) }

fn build<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: LionSettings = spec.settings_as(ComponentKind::Optimizer)?;
    let (beta_1, beta_2) = s.betas;
    if !(0.0..1.0).contains(&beta_1) || !(0.0..1.0).contains(&beta_2) {
        return Err(ComponentError::invalid(ComponentKind::Optimizer, &spec.name, "betas must be in [0, 1)"));
    }
    let lion = Lion { beta_1, beta_2, weight_decay: s.weight_decay };
    Ok(Box::new(OptimizerAdaptor::<Lion, M, B>::from(lion)))
}

pub fn register<M, B>(registry: &mut Registry<OptimizerCtor<M, B>>)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    registry.register("Lion", build::<M, B> as OptimizerCtor<M, B>);
}
