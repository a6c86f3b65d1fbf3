// ============================================================
// Layer 5 — ML Layer
// ============================================================
// Everything that touches burn modules, tensors or optimizers:
//
//   registry.rs  — Name → constructor tables (library / plugin tiers)
//   model.rs     — Classifier module and get_model()
//   loss.rs      — Loss functions and get_loss()
//   optimizer.rs — burn optimizers behind a handle, get_optimizer()
//   plugins/     — Optimizers implemented in this crate
//   scheduler.rs — Learning-rate schedules, get_scheduler()
//   metrics.rs   — Running, sample-weighted epoch metrics
//   fit.rs       — The epoch loop and best-checkpoint policy
//   trainer.rs   — Builds a run from its config; runs burn epochs
//
// Reference: Burn Book §5 (Training)

pub mod registry;
pub mod model;
pub mod loss;
pub mod optimizer;
pub mod plugins;
pub mod scheduler;
pub mod metrics;
pub mod fit;
pub mod trainer;
