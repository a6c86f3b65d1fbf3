// ============================================================
// Layer 3 — Error Kinds
// ============================================================
// Typed failures callers may want to match on. Everything else
// (I/O, device, shape errors, logging outages) travels as
// anyhow::Error straight to the process boundary.
//
// Reference: thiserror documentation
//            Rust Book §9 (Error Handling)

use std::fmt;
use thiserror::Error;

/// Which registry a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Dataset,
    Model,
    Loss,
    Optimizer,
    Scheduler,
    Metric,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Dataset   => "dataset",
            ComponentKind::Model     => "model",
            ComponentKind::Loss      => "loss",
            ComponentKind::Optimizer => "optimizer",
            ComponentKind::Scheduler => "scheduler",
            ComponentKind::Metric    => "metric",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to resolve or configure a named component.
#[derive(Debug, Error, PartialEq)]
pub enum ComponentError {
    #[error("{kind} with name '{name}' not found")]
    NotFound { kind: ComponentKind, name: String },

    #[error("invalid settings for {kind} '{name}': {reason}")]
    InvalidSettings {
        kind:   ComponentKind,
        name:   String,
        reason: String,
    },
}

impl ComponentError {
    pub fn not_found(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    pub fn invalid(kind: ComponentKind, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSettings { kind, name: name.into(), reason: reason.into() }
    }
}

/// Which half of an epoch an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Training-run failures that are not component lookups.
#[derive(Debug, Error, PartialEq)]
pub enum TrainError {
    #[error("training interrupted during epoch {epoch}")]
    Interrupted { epoch: usize },

    #[error("{split} data loader produced no batches")]
    EmptyEpoch { split: Split },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_kind_and_name() {
        let err = ComponentError::not_found(ComponentKind::Optimizer, "Adamax");
        assert_eq!(err.to_string(), "optimizer with name 'Adamax' not found");
    }

    #[test]
    fn test_not_found_survives_anyhow_downcast() {
        let err: anyhow::Error = ComponentError::not_found(ComponentKind::Loss, "Hinge").into();
        let typed = err.downcast_ref::<ComponentError>().unwrap();
        assert_eq!(
            typed,
            &ComponentError::NotFound { kind: ComponentKind::Loss, name: "Hinge".into() }
        );
    }
}
