// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-system concerns used by the other layers:
//
//   checkpoint.rs    — Saving and loading model weights
//                      with Burn's CompactRecorder.
//
//   config_loader.rs — Experiment configuration files
//                      (JSON, YAML or TOML) into a validated
//                      ExperimentConfig.
//
//   run_logger.rs    — Experiment tracking: a per-run directory
//                      with the effective config, one metrics
//                      line per epoch, logged model artifacts
//                      and a closing summary. Also resolves
//                      sweep configuration from the environment.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Config file parsing by extension
pub mod config_loader;

/// File-backed experiment logger and its session guard
pub mod run_logger;
