// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The application layer hands in
// loaders, a learning-rate controller and a metrics sink, and
// gets back plain summaries.
//
//   models/     architectures + name → network registry
//   scheduler   warmup ramp and milestone decay
//   inspect     gradient norms and parameter histograms
//   trainer     one training epoch, one evaluation pass
//   evaluator   top-1 / top-5 counting for the test command
//
// Backends: training runs on Autodiff<Wgpu> with -gpu and on
// Autodiff<NdArray> otherwise; evaluation uses the inner backend.

use burn::backend::{Autodiff, NdArray, Wgpu};

/// Network definitions and the model factory
pub mod models;

/// Learning-rate schedule
pub mod scheduler;

/// Read-only model views for logging
pub mod inspect;

/// Training epoch and evaluation loops
pub mod trainer;

/// Top-k evaluation
pub mod evaluator;

pub type GpuBackend = Autodiff<Wgpu>;
pub type CpuBackend = Autodiff<NdArray>;
