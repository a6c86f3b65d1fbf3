// ============================================================
// Layer 5 — Local Optimizer Plugins
// ============================================================
// Optimizers burn does not ship, written against burn's
// SimpleOptimizer trait and wrapped in an OptimizerAdaptor.
//
// Each plugin module exposes `register`, which adds its names to
// the plugin tier. register_all() calls them in a fixed order;
// that order is the lookup order when two plugins share a name.
//
//   lion.rs   — Lion (Chen et al. 2023), sign of interpolated momentum
//   signum.rs — Signum (Bernstein et al. 2018), sign of momentum
//
// Reference: Burn Book §5 (Custom optimizers via SimpleOptimizer)

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::ml::optimizer::OptimizerCtor;
use crate::ml::registry::Registry;

pub mod lion;
pub mod signum;

pub fn register_all<M, B>(registry: &mut Registry<OptimizerCtor<M, B>>)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + 'static,
{
    lion::register(registry);
    signum::register(registry);
}
