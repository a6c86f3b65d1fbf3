// ============================================================
// Layer 5 — Component Registries
// ============================================================
// Name → constructor tables that every factory resolves against.
//
// Two tiers per component kind:
//   library — implementations burn ships (Adam, CrossEntropyLoss, ...)
//   plugins — implementations defined in this crate
//
// Lookup is exact-name, library first, then plugins in the order
// their modules registered. Plugins register themselves through a
// `register` function that the owning factory calls explicitly when
// it builds its registry, so there is no import-time global state.

use crate::domain::error::{ComponentError, ComponentKind};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Library,
    Plugin,
}

/// An ordered table of named constructors for one component kind.
pub struct Registry<F> {
    kind:    ComponentKind,
    entries: Vec<(&'static str, F)>,
}

impl<F> Registry<F> {
    pub fn new(kind: ComponentKind) -> Self {
        Self { kind, entries: Vec::new() }
    }

    /// Add a constructor. A name that is already present keeps its
    /// first registration.
    pub fn register(&mut self, name: &'static str, ctor: F) -> &mut Self {
        if self.get(name).is_some() {
            tracing::warn!("{} '{}' registered twice; keeping the first", self.kind, name);
        } else {
            self.entries.push((name, ctor));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, ctor)| ctor)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }
}

/// A library tier backed by a plugin tier.
pub struct TieredRegistry<F> {
    pub library: Registry<F>,
    pub plugins: Registry<F>,
}

impl<F> TieredRegistry<F> {
    pub fn new(kind: ComponentKind) -> Self {
        Self {
            library: Registry::new(kind),
            plugins: Registry::new(kind),
        }
    }

    /// Library first; the plugin tier is only consulted on a library miss.
    pub fn resolve(&self, name: &str) -> Result<(Origin, &F), ComponentError> {
        if let Some(ctor) = self.library.get(name) {
            return Ok((Origin::Library, ctor));
        }
        self.plugins
            .get(name)
            .map(|ctor| (Origin::Plugin, ctor))
            .ok_or_else(|| ComponentError::not_found(self.library.kind(), name))
    }
}
