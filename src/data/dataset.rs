use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One labelled feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub features: Vec<f32>,
    pub label:    usize,
}

impl Sample {
    pub fn new(features: Vec<f32>, label: usize) -> Self {
        Self { features, label }
    }
}

pub struct TabularDataset {
    samples: Vec<Sample>,
}

impl TabularDataset {
    pub fn new(samples: Vec<Sample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Width of the feature vectors (0 for an empty dataset).
    pub fn num_features(&self) -> usize {
        self.samples.first().map(|s| s.features.len()).unwrap_or(0)
    }
}

impl Dataset<Sample> for TabularDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
