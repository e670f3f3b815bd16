// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Wires the other layers together for the two commands.
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No direct file formats (that's Layers 4 and 6)
//   - Only workflow: what runs, in which order, with which config
//
// The per-batch and per-epoch console lines come from the loops
// themselves; this layer prints the run-level ones (resume,
// checkpoint saves, final report).

// Static constants and their JSON overrides
pub mod settings;

// The training run driver
pub mod train_use_case;

// The top-1 / top-5 evaluation workflow
pub mod test_use_case;
