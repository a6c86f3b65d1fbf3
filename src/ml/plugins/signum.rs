//! Signum: SGD on the sign of an exponential moving average of gradients.
//!
//!   m = β·m + (1 − β)·g
//!   θ = θ − lr·sign(m)
//!
//! With `momentum = 0` this is plain signSGD.

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
pub struct Signum {
    momentum: f64,
}

#[derive(Record, Clone)]
pub struct SignumState<B: Backend, const D: usize> {
    pub average: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Signum {
    type State<const D: usize> = SignumState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let average = match state {
            Some(state) => state
                .average
                .mul_scalar(self.momentum)
                .add(grad.mul_scalar(1.0 - self.momentum)),
            None => grad.mul_scalar(1.0 - self.momentum),
        };

        let tensor = tensor.sub(average.clone().sign().mul_scalar(lr));
        (tensor, Some(SignumState { average }))
    }

    fn to_device<const D: usize>(state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        SignumState { average: state.average.to_device(device) }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignumSettings {
    #[serde(default = "default_momentum")]
    momentum: f64,
}

fn default_momentum() -> f64 { 0.9 }

fn build<M, B>(spec: &ComponentSpec) -> Result<BoxedOptimizer<M, B>, ComponentError>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    let s: SignumSettings = spec.settings_as(ComponentKind::Optimizer)?;
    if !(0.0..1.0).contains(&s.momentum) {
        return Err(ComponentError::invalid(ComponentKind::Optimizer, &spec.name, "momentum must be in [0, 1)"));
    }
    Ok(Box::new(OptimizerAdaptor::<Signum, M, B>::from(Signum { momentum: s.momentum })))
}

pub fn register<M, B>(registry: &mut Registry<OptimizerCtor<M, B>>)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    registry.register("Signum", build::<M, B> as OptimizerCtor<M, B>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn values(tensor: Tensor<NdArray, 1>) -> Vec<f32> {
        tensor.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_steps_follow_sign_of_averaged_gradient() {
        let device = Default::default();
        let signum = Signum { momentum: 0.9 };
        let param = Tensor::<NdArray, 1>::from_floats([1.0, 1.0, 1.0], &device);

        let grad = Tensor::<NdArray, 1>::from_floats([0.5, -2.0, 0.0], &device);
        let (param, state) = signum.step(0.1, param, grad, None);
        let after_first = values(param.clone());
        for (got, want) in after_first.iter().zip([0.9, 1.1, 1.0]) {
            assert!((got - want).abs() < 1e-6, "{after_first:?}");
        }

        // The average keeps the first coordinate positive despite a
        // small negative gradient.
        let grad = Tensor::<NdArray, 1>::from_floats([-0.1, 1.0, 1.0], &device);
        let (param, state) = signum.step(0.1, param, grad, state);
        let after_second = values(param);
        for (got, want) in after_second.iter().zip([0.8, 1.2, 0.9]) {
            assert!((got - want).abs() < 1e-6, "{after_second:?}");
        }

        let average = values(state.unwrap().average);
        for (got, want) in average.iter().zip([0.035, -0.08, 0.1]) {
            assert!((got - want).abs() < 1e-6, "{average:?}");
        }
    }
}
