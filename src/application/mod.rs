// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training, evaluating, listing components).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing or printing here (that's Layer 1)
//   - Only workflow coordination, plus choosing the burn backend
//     a run is compiled against
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Device string → concrete burn backend
pub mod backend;

// Every registered component name, per kind and tier
pub mod catalog;

// The training workflow (also used by sweeps)
pub mod train_use_case;

// Restore the best checkpoint and validate it
pub mod evaluate_use_case;
