// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of a run:
//
//   checkpoint.rs  — full-precision .mpk.gz weights save/load,
//                    the .json record next to each weights
//                    file, train_config.json, and the locator
//                    that picks what to resume from
//
//   metrics.rs     — the on-disk MetricsSink: per-iteration
//                    scalars, per-epoch histograms and an epoch
//                    summary CSV under runs/{net}/{timestamp}/
//
//   chart.rs       — accuracy-vs-epoch PNG via plotters

/// Checkpoint persistence and lookup
pub mod checkpoint;

/// Run logger (scalars, histograms, epoch summaries)
pub mod metrics;

/// Accuracy chart rendering
pub mod chart;
