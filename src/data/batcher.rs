// ============================================================
// Layer 4 — Tabular Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<Sample> into
// one feature matrix and one label vector.
//
//   Input:  N samples, each with F features
//   Output: inputs  [N, F]  (float)
//           targets [N]     (int class index)
//
// All samples share the same width (checked when the dataset is
// loaded), so a flat Vec reshaped to [N, F] is all that's needed.
//
// Reference: Burn Book §4 (Batcher)

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::marker::PhantomData;

use crate::data::dataset::Sample;

/// A mini-batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct TabularBatch<B: Backend> {
    /// Feature matrix — shape: [batch_size, num_features]
    pub inputs: Tensor<B, 2>,

    /// Class indices — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> TabularBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.targets.dims()[0]
    }
}

/// Stateless batcher, tied to one backend so the data loader's
/// batch type is fully determined.
#[derive(Clone, Debug, Default)]
pub struct TabularBatcher<B: Backend> {
    _backend: PhantomData<B>,
}

impl<B: Backend> TabularBatcher<B> {
    pub fn new() -> Self {
        Self { _backend: PhantomData }
    }
}

impl<B: Backend> Batcher<B, Sample, TabularBatch<B>> for TabularBatcher<B> {
    fn batch(&self, items: Vec<Sample>, device: &B::Device) -> TabularBatch<B> {
        let batch_size   = items.len();
        let num_features = items.first().map(|s| s.features.len()).unwrap_or(0);

        // [s1_f1, s1_f2, ..., sN_fF] → [N, F]
        let flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.features.iter().copied())
            .collect();

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let inputs = Tensor::<B, 1>::from_floats(flat.as_slice(), device)
            .reshape([batch_size, num_features]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

        TabularBatch { inputs, targets }
    }
}
