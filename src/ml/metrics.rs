// ============================================================
// Layer 5 — Running Metrics
// ============================================================
// Per-epoch accumulation of loss and classification metrics.
//
//   init_exec_params()  → zeroed accumulator, one slot per metric
//   record_loss()       → dataset_size += n, running_loss += loss * n
//   compute_metrics()   → fold one batch in, return cumulative values
//
// Every metric is stored as (hits, seen) and reported as hits / seen,
// so the end-of-epoch value depends only on the multiset of
// (prediction, target) pairs, not on how they were batched.
//
// Supported names:
//   accuracy          argmax(logits) == target
//   error_rate        1 - accuracy
//   top{k}_accuracy   target among the k largest logits
//
// Reference: Burn Book §5 (Metrics)

use burn::prelude::*;

use crate::domain::error::{ComponentError, ComponentKind};
use crate::domain::traits::MetricSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
    ErrorRate,
    TopK(usize),
}

impl Metric {
    pub fn parse(name: &str) -> Result<Self, ComponentError> {
        match name {
            "accuracy"   => Ok(Metric::Accuracy),
            "error_rate" => Ok(Metric::ErrorRate),
            _ => name
                .strip_prefix("top")
                .and_then(|rest| rest.strip_suffix("_accuracy"))
                .and_then(|k| k.parse::<usize>().ok())
                .filter(|&k| k > 0)
                .map(Metric::TopK)
                .ok_or_else(|| ComponentError::not_found(ComponentKind::Metric, name)),
        }
    }

    /// Whether one row counts as a hit for this metric.
    fn hit(&self, row: &[f32], target: usize) -> bool {
        match self {
            Metric::Accuracy  => argmax(row) == Some(target),
            Metric::ErrorRate => argmax(row) != Some(target),
            Metric::TopK(k)   => {
                let Some(&score) = row.get(target) else { return false };
                // Ties are resolved in the target's favour.
                row.iter().filter(|&&other| other > score).count() < *k
            }
        }
    }
}

fn argmax(row: &[f32]) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// The configured metrics of a run, in configuration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSet {
    entries: Vec<(String, Metric)>,
}

impl MetricSet {
    pub fn parse(names: &[String]) -> Result<Self, ComponentError> {
        let entries = names
            .iter()
            .map(|name| Metric::parse(name).map(|m| (name.clone(), m)))
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Running totals for one split of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecParams {
    pub dataset_size: usize,
    pub running_loss: f64,
    /// (hits, seen) per metric, aligned with the MetricSet
    running: Vec<(u64, u64)>,
}

impl ExecParams {
    /// Fold one batch's mean loss in, weighted by its size.
    /// Returns the sample-weighted epoch loss so far.
    pub fn record_loss(&mut self, batch_loss: f64, batch_size: usize) -> f64 {
        self.dataset_size += batch_size;
        self.running_loss += batch_loss * batch_size as f64;
        self.epoch_loss()
    }

    pub fn epoch_loss(&self) -> f64 {
        if self.dataset_size == 0 {
            f64::NAN
        } else {
            self.running_loss / self.dataset_size as f64
        }
    }
}

pub fn init_exec_params(metrics: &MetricSet) -> ExecParams {
    ExecParams {
        dataset_size: 0,
        running_loss: 0.0,
        running:      vec![(0, 0); metrics.entries.len()],
    }
}

/// Host-side copy of one batch's logits and targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    logits:      Vec<f32>,
    num_classes: usize,
    targets:     Vec<usize>,
}

impl Predictions {
    pub fn new(logits: Vec<f32>, num_classes: usize, targets: Vec<usize>) -> Self {
        debug_assert_eq!(logits.len(), num_classes * targets.len());
        Self { logits, num_classes, targets }
    }

    /// Pull a batch back from the device. Call only when at least one
    /// metric is configured; it forces a device sync.
    pub fn from_tensors<B: Backend>(outputs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Self {
        let [_, num_classes] = outputs.dims();
        let logits: Vec<f32> = outputs.into_data().iter::<f32>().collect();
        let targets: Vec<usize> = targets
            .into_data()
            .iter::<i64>()
            .map(|t| t.max(0) as usize)
            .collect();
        Self::new(logits, num_classes, targets)
    }

    fn rows(&self) -> impl Iterator<Item = (&[f32], usize)> {
        self.logits
            .chunks(self.num_classes.max(1))
            .zip(self.targets.iter().copied())
    }
}

/// Fold one batch into `exec` and return the cumulative value of every metric.
pub fn compute_metrics(metrics: &MetricSet, predictions: &Predictions, exec: &mut ExecParams) -> MetricSnapshot {
    for ((_, metric), (hits, seen)) in metrics.entries.iter().zip(exec.running.iter_mut()) {
        for (row, target) in predictions.rows() {
            *seen += 1;
            if metric.hit(row, target) {
                *hits += 1;
            }
        }
    }
    snapshot(metrics, exec)
}

/// Current cumulative metric values without folding in a new batch.
pub fn snapshot(metrics: &MetricSet, exec: &ExecParams) -> MetricSnapshot {
    metrics
        .entries
        .iter()
        .zip(exec.running.iter())
        .map(|((name, _), &(hits, seen))| {
            let value = if seen == 0 { 0.0 } else { hits as f64 / seen as f64 };
            (name.clone(), value)
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// 4 samples, 3 classes: rows 0 and 2 correct, row 1 correct in top-2.
    fn four_rows() -> Predictions {
        Predictions::new(
            vec![
                0.9, 0.05, 0.05, // → 0
                0.5, 0.4, 0.1,   // → 0, target 1 (second best)
                0.1, 0.1, 0.8,   // → 2
                0.2, 0.7, 0.1,   // → 1, target 2 (last)
            ],
            3,
            vec![0, 1, 2, 2],
        )
    }

    fn split(p: &Predictions, at: usize) -> (Predictions, Predictions) {
        let cut = at * p.num_classes;
        (
            Predictions::new(p.logits[..cut].to_vec(), p.num_classes, p.targets[..at].to_vec()),
            Predictions::new(p.logits[cut..].to_vec(), p.num_classes, p.targets[at..].to_vec()),
        )
    }

    #[test]
    fn test_metric_name_parsing() {
        assert_eq!(Metric::parse("accuracy").unwrap(), Metric::Accuracy);
        assert_eq!(Metric::parse("top5_accuracy").unwrap(), Metric::TopK(5));
        assert_eq!(
            Metric::parse("top0_accuracy").unwrap_err(),
            ComponentError::not_found(ComponentKind::Metric, "top0_accuracy")
        );
        assert!(Metric::parse("f1").is_err());
    }

    #[test]
    fn test_cumulative_values() {
        let metrics = MetricSet::parse(&names(&["accuracy", "error_rate", "top2_accuracy"])).unwrap();
        let mut exec = init_exec_params(&metrics);
        let snap = compute_metrics(&metrics, &four_rows(), &mut exec);

        assert_eq!(snap["accuracy"], 0.5);
        assert_eq!(snap["error_rate"], 0.5);
        assert_eq!(snap["top2_accuracy"], 0.75);
    }

    #[test]
    fn test_metrics_invariant_to_batch_partition() {
        let metrics = MetricSet::parse(&names(&["accuracy", "top2_accuracy"])).unwrap();
        let whole = four_rows();

        let mut one = init_exec_params(&metrics);
        let expected = compute_metrics(&metrics, &whole, &mut one);

        for cut in 1..4 {
            let (a, b) = split(&whole, cut);
            let mut two = init_exec_params(&metrics);
            compute_metrics(&metrics, &a, &mut two);
            assert_eq!(compute_metrics(&metrics, &b, &mut two), expected, "cut at {cut}");
        }
    }

    #[test]
    fn test_epoch_loss_is_sample_weighted() {
        let metrics = MetricSet::parse(&[]).unwrap();
        let mut exec = init_exec_params(&metrics);
        exec.record_loss(0.5, 32);
        exec.record_loss(0.5, 32);
        let loss = exec.record_loss(2.0, 4);
        // (0.5*64 + 2.0*4) / 68
        assert!((loss - 40.0 / 68.0).abs() < 1e-12);
    }

    #[test]
    fn test_loss_invariant_to_splitting_a_batch() {
        let metrics = MetricSet::parse(&[]).unwrap();
        let per_sample = [0.2, 0.4, 0.9, 0.1, 0.6, 0.3];

        // Batches of sizes 4 and 2, each reporting its mean loss.
        let mut coarse = init_exec_params(&metrics);
        coarse.record_loss(per_sample[..4].iter().sum::<f64>() / 4.0, 4);
        coarse.record_loss(per_sample[4..].iter().sum::<f64>() / 2.0, 2);

        // Same samples, first batch split in two.
        let mut fine = init_exec_params(&metrics);
        fine.record_loss(per_sample[..1].iter().sum::<f64>(), 1);
        fine.record_loss(per_sample[1..4].iter().sum::<f64>() / 3.0, 3);
        fine.record_loss(per_sample[4..].iter().sum::<f64>() / 2.0, 2);

        let mean = per_sample.iter().sum::<f64>() / 6.0;
        assert!((coarse.epoch_loss() - mean).abs() < 1e-12);
        assert!((fine.epoch_loss() - mean).abs() < 1e-12);
    }

    #[test]
    fn test_fresh_exec_params_are_zeroed() {
        let metrics = MetricSet::parse(&names(&["accuracy"])).unwrap();
        let exec = init_exec_params(&metrics);
        assert_eq!(exec.dataset_size, 0);
        assert_eq!(exec.running_loss, 0.0);
        assert!(exec.epoch_loss().is_nan());
        assert_eq!(snapshot(&metrics, &exec)["accuracy"], 0.0);
    }

    #[test]
    fn test_from_tensors() {
        let device = Default::default();
        let outputs = Tensor::<NdArray, 2>::from_floats([[0.1, 0.9], [0.8, 0.2]], &device);
        let targets = Tensor::<NdArray, 1, Int>::from_ints([1, 1], &device);

        let metrics = MetricSet::parse(&names(&["accuracy"])).unwrap();
        let mut exec = init_exec_params(&metrics);
        let snap = compute_metrics(&metrics, &Predictions::from_tensors(outputs, targets), &mut exec);
        assert_eq!(snap["accuracy"], 0.5);
    }
}
