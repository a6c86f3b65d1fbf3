// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a `dataset` config section to tensor batches:
//
//   loader      → resolves the named source, splits, builds loaders
//       │
//       ▼
//   splitter    → seeded train / validation split
//       │
//       ▼
//   dataset     → implements Burn's Dataset trait
//       │
//       ▼
//   batcher     → stacks samples into [N, F] / [N] tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// get_dataloaders() and the dataset source plugins
pub mod loader;

/// Implements Burn's Dataset trait for labelled feature rows
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
