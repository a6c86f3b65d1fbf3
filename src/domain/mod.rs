// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that describe a training run:
// the configuration tree, the typed error kinds, and the two
// traits the fit loop is written against.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Experiment configuration tree and dotted overrides
pub mod config;

// ComponentError / TrainError
pub mod error;

// EpochRunner and ExperimentLogger
pub mod traits;
