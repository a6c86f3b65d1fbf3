// ============================================================
// Layer 4 — Data Loader Factory
// ============================================================
// get_dataloaders() turns the `dataset` config section into a pair
// of Burn DataLoaders:
//
//   dataset: { name: "Blobs" | "Csv", settings: {...} }
//       │
//       ▼
//   source plugin      → Vec<Sample> (all rows)
//       │
//       ▼
//   split_train_val    → seeded train / validation split
//       │
//       ▼
//   TabularDataset     → Burn Dataset
//       │
//       ▼
//   DataLoaderBuilder  → train loader (autodiff backend, shuffled)
//                        val loader   (inner backend, ordered)
//
// Settings shared by every source: batch_size, val_fraction, seed,
// num_workers. Everything else belongs to the named source and is
// checked against that source's settings struct.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            csv crate documentation

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::{TabularBatch, TabularBatcher},
    dataset::{Sample, TabularDataset},
    splitter::split_train_val,
};
use crate::domain::config::{ComponentSpec, Settings};
use crate::domain::error::{ComponentError, ComponentKind};
use crate::ml::registry::TieredRegistry;

/// Builds every row of a dataset from its source-specific settings.
pub type SourceCtor = fn(&ComponentSpec) -> Result<Vec<Sample>>;

/// Train and validation loaders plus the shape of the data they serve.
pub struct DataLoaders<B: AutodiffBackend> {
    pub train: Arc<dyn DataLoader<B, TabularBatch<B>>>,
    pub val:   Arc<dyn DataLoader<B::InnerBackend, TabularBatch<B::InnerBackend>>>,

    /// Number of batches per epoch on each split
    pub train_batches: usize,
    pub val_batches:   usize,

    pub num_features:  usize,
    pub num_classes:   usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoaderSettings {
    #[serde(default = "default_batch_size")]
    batch_size:   usize,
    #[serde(default = "default_val_fraction")]
    val_fraction: f64,
    #[serde(default = "default_seed")]
    seed:         u64,
    #[serde(default = "default_num_workers")]
    num_workers:  usize,
}

impl LoaderSettings {
    const KEYS: [&'static str; 4] = ["batch_size", "val_fraction", "seed", "num_workers"];
}

fn default_batch_size()   -> usize { 32 }
fn default_val_fraction() -> f64   { 0.2 }
fn default_seed()         -> u64   { 42 }
fn default_num_workers()  -> usize { 1 }

/// Dataset sources, in lookup order. Burn's own datasets need extra
/// features and downloads, so the library tier is empty.
pub fn dataset_registry() -> TieredRegistry<SourceCtor> {
    let mut registry = TieredRegistry::new(ComponentKind::Dataset);
    registry
        .plugins
        .register("Blobs", load_blobs as SourceCtor)
        .register("Csv", load_csv as SourceCtor);
    registry
}

/// Resolve the `dataset` section and build both data loaders.
pub fn get_dataloaders<B: AutodiffBackend>(spec: &ComponentSpec) -> Result<DataLoaders<B>> {
    let (loader_settings, source_spec) = split_loader_settings(spec)?;

    let registry  = dataset_registry();
    let (origin, source) = registry.resolve(&spec.name)?;
    tracing::info!("Loading dataset '{}' ({:?})", spec.name, origin);

    let samples = source(&source_spec)?;
    let num_classes = check_samples(&spec.name, &samples)?;

    let (train, val) = split_train_val(samples, 1.0 - loader_settings.val_fraction, loader_settings.seed);
    if train.is_empty() || val.is_empty() {
        anyhow::bail!(
            "dataset '{}' split into {} training and {} validation samples; both must be non-empty",
            spec.name,
            train.len(),
            val.len()
        );
    }

    let train_dataset = TabularDataset::new(train);
    let val_dataset   = TabularDataset::new(val);
    let num_features  = train_dataset.num_features();
    let train_samples = train_dataset.sample_count();
    let val_samples   = val_dataset.sample_count();
    let batch_size    = loader_settings.batch_size;

    let train_loader = DataLoaderBuilder::new(TabularBatcher::<B>::new())
        .batch_size(batch_size)
        .shuffle(loader_settings.seed)
        .num_workers(loader_settings.num_workers)
        .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(TabularBatcher::<B::InnerBackend>::new())
        .batch_size(batch_size)
        .num_workers(loader_settings.num_workers)
        .build(val_dataset);

    tracing::info!(
        "Data ready: {} train / {} val samples, {} features, {} classes, batch_size={}",
        train_samples, val_samples, num_features, num_classes, batch_size
    );

    Ok(DataLoaders {
        train: train_loader,
        val: val_loader,
        train_batches: train_samples.div_ceil(batch_size),
        val_batches: val_samples.div_ceil(batch_size),
        num_features,
        num_classes,
    })
}

/// Pull the shared loader keys out of the settings map, leaving only
/// the source-specific ones behind.
fn split_loader_settings(spec: &ComponentSpec) -> Result<(LoaderSettings, ComponentSpec), ComponentError> {
    let mut source_spec = spec.clone();
    let mut shared = Settings::new();
    for key in LoaderSettings::KEYS {
        if let Some(value) = source_spec.settings.remove(key) {
            shared.insert(key.to_string(), value);
        }
    }

    let loader_settings: LoaderSettings = ComponentSpec { name: spec.name.clone(), settings: shared }
        .settings_as(ComponentKind::Dataset)?;

    if loader_settings.batch_size == 0 {
        return Err(ComponentError::invalid(ComponentKind::Dataset, &spec.name, "batch_size must be > 0"));
    }
    if !(loader_settings.val_fraction > 0.0 && loader_settings.val_fraction < 1.0) {
        return Err(ComponentError::invalid(
            ComponentKind::Dataset,
            &spec.name,
            "val_fraction must be in (0, 1)",
        ));
    }

    Ok((loader_settings, source_spec))
}

/// Every row must have the same, non-zero width. Returns the class count.
fn check_samples(name: &str, samples: &[Sample]) -> Result<usize> {
    let Some(first) = samples.first() else {
        anyhow::bail!("dataset '{name}' is empty");
    };
    let width = first.features.len();
    if width == 0 {
        anyhow::bail!("dataset '{name}' has no feature columns");
    }
    if let Some((row, bad)) = samples.iter().enumerate().find(|(_, s)| s.features.len() != width) {
        anyhow::bail!(
            "dataset '{name}' row {row} has {} features, expected {width}",
            bad.features.len()
        );
    }
    Ok(samples.iter().map(|s| s.label).max().unwrap_or(0) + 1)
}

// ─── Blobs ────────────────────────────────────────────────────────────────────
// Isotropic Gaussian clusters, one per class, centres drawn uniformly
// from [-center_box, center_box]^F. Fully determined by the seed.

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct BlobsSettings {
    #[serde(default = "default_n_samples")]
    n_samples:  usize,
    #[serde(default = "default_n_features")]
    n_features: usize,
    #[serde(default = "default_n_classes")]
    n_classes:  usize,
    #[serde(default = "default_spread")]
    spread:     f32,
    #[serde(default = "default_center_box")]
    center_box: f32,
    #[serde(default = "default_seed")]
    data_seed:  u64,
}

fn default_n_samples()  -> usize { 600 }
fn default_n_features() -> usize { 2 }
fn default_n_classes()  -> usize { 3 }
fn default_spread()     -> f32   { 1.0 }
fn default_center_box() -> f32   { 8.0 }

fn load_blobs(spec: &ComponentSpec) -> Result<Vec<Sample>> {
    let s: BlobsSettings = spec.settings_as(ComponentKind::Dataset)?;
    if s.n_classes == 0 || s.n_features == 0 {
        return Err(ComponentError::invalid(
            ComponentKind::Dataset,
            &spec.name,
            "n_classes and n_features must be > 0",
        )
        .into());
    }

    let mut rng = StdRng::seed_from_u64(s.data_seed);
    let centers: Vec<Vec<f32>> = (0..s.n_classes)
        .map(|_| {
            (0..s.n_features)
                .map(|_| rng.gen_range(-s.center_box..=s.center_box))
                .collect()
        })
        .collect();

    let samples = (0..s.n_samples)
        .map(|i| {
            let label = i % s.n_classes;
            let features = centers[label]
                .iter()
                .map(|c| c + s.spread * standard_normal(&mut rng))
                .collect();
            Sample::new(features, label)
        })
        .collect();

    Ok(samples)
}

/// Box-Muller transform.
fn standard_normal(rng: &mut impl Rng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

// ─── Csv ──────────────────────────────────────────────────────────────────────
// Numeric feature columns plus one integer class column.

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CsvSettings {
    path: PathBuf,

    /// Header name of the label column; defaults to the last column
    #[serde(default)]
    label_column: Option<String>,

    #[serde(default = "default_has_header")]
    has_header: bool,

    #[serde(default = "default_delimiter")]
    delimiter: char,
}

fn default_has_header() -> bool { true }
fn default_delimiter()  -> char { ',' }

fn load_csv(spec: &ComponentSpec) -> Result<Vec<Sample>> {
    let s: CsvSettings = spec.settings_as(ComponentKind::Dataset)?;
    if !s.delimiter.is_ascii() {
        return Err(ComponentError::invalid(ComponentKind::Dataset, &spec.name, "delimiter must be ASCII").into());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(s.has_header)
        .delimiter(s.delimiter as u8)
        .trim(csv::Trim::All)
        .from_path(&s.path)
        .with_context(|| format!("Cannot open CSV dataset '{}'", s.path.display()))?;

    let label_index = match (&s.label_column, s.has_header) {
        (Some(column), true) => {
            let headers = reader.headers()?;
            Some(
                headers
                    .iter()
                    .position(|h| h == column)
                    .with_context(|| format!("label column '{column}' not in '{}'", s.path.display()))?,
            )
        }
        (Some(_), false) => {
            return Err(ComponentError::invalid(
                ComponentKind::Dataset,
                &spec.name,
                "label_column requires has_header = true",
            )
            .into());
        }
        (None, _) => None,
    };

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad CSV row {row} in '{}'", s.path.display()))?;
        let label_at = label_index.unwrap_or(record.len().saturating_sub(1));

        let label: usize = record
            .get(label_at)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("row {row}: label must be a non-negative integer"))?;

        let features = record
            .iter()
            .enumerate()
            .filter(|(col, _)| *col != label_at)
            .map(|(col, field)| {
                field
                    .parse::<f32>()
                    .with_context(|| format!("row {row}, column {col}: '{field}' is not a number"))
            })
            .collect::<Result<Vec<f32>>>()?;

        samples.push(Sample::new(features, label));
    }

    tracing::debug!("Read {} rows from '{}'", samples.len(), s.path.display());
    Ok(samples)
}
