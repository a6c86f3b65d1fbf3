// ============================================================
// Layer 2 — Component Catalog
// ============================================================
// Every name a config file may use, per component kind and tier,
// in lookup order. Backs the `components` command.

use burn::backend::{Autodiff, NdArray};

use crate::data::loader::dataset_registry;
use crate::domain::error::ComponentKind;
use crate::ml::loss::loss_registry;
use crate::ml::model::{model_registry, Classifier};
use crate::ml::optimizer::optimizer_registry;
use crate::ml::registry::{Origin, TieredRegistry};
use crate::ml::scheduler::scheduler_registry;

/// Optimizer names don't depend on the backend; any concrete one will do.
type ListingBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub kind:   ComponentKind,
    pub origin: Origin,
    pub names:  Vec<&'static str>,
}

pub fn component_catalog() -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    push_tiers(&mut entries, &dataset_registry());
    push_tiers(&mut entries, &model_registry());
    push_tiers(&mut entries, &loss_registry());
    push_tiers(&mut entries, &optimizer_registry::<Classifier<ListingBackend>, ListingBackend>());
    push_tiers(&mut entries, &scheduler_registry());
    entries.push(CatalogEntry {
        kind:   ComponentKind::Metric,
        origin: Origin::Library,
        names:  vec!["accuracy", "error_rate", "top{k}_accuracy"],
    });
    entries
}

fn push_tiers<F>(entries: &mut Vec<CatalogEntry>, registry: &TieredRegistry<F>) {
    for (origin, tier) in [(Origin::Library, &registry.library), (Origin::Plugin, &registry.plugins)] {
        let names = tier.names();
        if !names.is_empty() {
            entries.push(CatalogEntry { kind: tier.kind(), origin, names });
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn names(kind: ComponentKind, origin: Origin) -> Vec<&'static str> {
        component_catalog()
            .into_iter()
            .find(|e| e.kind == kind && e.origin == origin)
            .map(|e| e.names)
            .unwrap_or_default()
    }

    #[test]
    fn test_optimizer_tiers_in_lookup_order() {
        assert_eq!(names(ComponentKind::Optimizer, Origin::Library), ["Sgd", "SGD", "Adam", "AdamW", "RmsProp", "RMSprop"]);
        assert_eq!(names(ComponentKind::Optimizer, Origin::Plugin), ["Lion", "Signum"]);
    }

    #[test]
    fn test_scheduler_tiers() {
        assert_eq!(names(ComponentKind::Scheduler, Origin::Library), ["StepLR", "ExponentialLR", "CosineAnnealingLR"]);
        assert_eq!(names(ComponentKind::Scheduler, Origin::Plugin), ["OneCycleLR"]);
    }

    #[test]
    fn test_empty_tiers_are_omitted() {
        assert!(names(ComponentKind::Dataset, Origin::Library).is_empty());
        assert_eq!(names(ComponentKind::Dataset, Origin::Plugin), ["Blobs", "Csv"]);
    }
}
