// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing what a run
// produces: checkpoints, metrics and the ways it can fail.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain data and traits other layers implement

// Failure taxonomy shared by every layer
pub mod error;

// Checkpoint metadata and its file-name encoding
pub mod checkpoint;

// Top-k counters, accuracy history, histograms
pub mod metrics;

// Abstractions implemented by other layers
pub mod traits;
